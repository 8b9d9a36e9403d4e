use crate::{AncillaryList, EventIterator, EventList, Invalidated, Notifier};
use flume::Receiver;
use std::{collections::HashMap, sync::Arc};
use wtf_trace_types::{BuiltinEvent, EventType, EventTypeTable, Value};

/// A frame delimited by `wtf.timing#frameStart` and `wtf.timing#frameEnd`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    ordinal: usize,
    number: u32,
    start_event_id: Option<usize>,
    end_event_id: Option<usize>,
    time: Option<f64>,
    end_time: Option<f64>,
}

/// Complete frames of a zone, in time order.
#[derive(Debug, Default)]
pub struct FrameList {
    frames: Vec<Frame>,
    by_number: HashMap<u32, usize>,
    notifier: Notifier<Invalidated>,
}

impl Frame {
    fn new(number: u32) -> Self {
        Self {
            ordinal: 0,
            number,
            start_event_id: None,
            end_event_id: None,
            time: None,
            end_time: None,
        }
    }

    /// Position in the frame list.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Frame number as recorded.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn start_event_id(&self) -> usize {
        self.start_event_id.unwrap_or_default()
    }

    pub fn end_event_id(&self) -> usize {
        self.end_event_id.unwrap_or_default()
    }

    pub fn time(&self) -> f64 {
        self.time.unwrap_or_default()
    }

    pub fn end_time(&self) -> f64 {
        self.end_time.unwrap_or_default()
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.time()
    }

    fn is_complete(&self) -> bool {
        self.time.is_some() && self.end_time.is_some()
    }
}

impl FrameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn subscribe(&mut self) -> Receiver<Invalidated> {
        self.notifier.subscribe()
    }

    pub fn get_frame(&self, number: u32) -> Option<&Frame> {
        self.frames.get(*self.by_number.get(&number)?)
    }

    pub fn get_previous_frame(&self, frame: &Frame) -> Option<&Frame> {
        self.frames.get(frame.ordinal.checked_sub(1)?)
    }

    pub fn get_next_frame(&self, frame: &Frame) -> Option<&Frame> {
        self.frames.get(frame.ordinal + 1)
    }

    pub fn get_frame_at_time(&self, time: f64) -> Option<&Frame> {
        let index = self
            .frames
            .partition_point(|f| f.time() <= time)
            .saturating_sub(1);
        let frame = self.frames.get(index)?;
        if frame.time() <= time && frame.end_time() >= time {
            Some(frame)
        } else {
            None
        }
    }

    /// The frames before and after `time`. Inside a frame, that frame and the next.
    pub fn get_intra_frame_at_time(&self, time: f64) -> (Option<&Frame>, Option<&Frame>) {
        match self.frames.partition_point(|f| f.time() <= time) {
            0 => (None, self.frames.first()),
            index => {
                let previous = &self.frames[index - 1];
                (Some(previous), self.get_next_frame(previous))
            }
        }
    }

    pub fn for_each_intersecting<F: FnMut(&Frame)>(&self, start_time: f64, end_time: f64, mut f: F) {
        let index = self
            .frames
            .partition_point(|f| f.time() <= start_time)
            .saturating_sub(1);
        for frame in self.frames.iter().skip(index) {
            if frame.end_time() < start_time {
                continue;
            }
            if frame.time() > end_time {
                break;
            }
            f(frame);
        }
    }
}

impl AncillaryList for FrameList {
    fn begin_rebuild(&mut self, event_types: &EventTypeTable) -> Vec<Option<Arc<EventType>>> {
        self.frames.clear();
        self.by_number.clear();
        vec![
            event_types.get_by_name(BuiltinEvent::FrameStart.name()).cloned(),
            event_types.get_by_name(BuiltinEvent::FrameEnd.name()).cloned(),
        ]
    }

    fn handle_event(&mut self, event_type_index: usize, _: &Arc<EventType>, it: &EventIterator<'_>) {
        let number = match it.argument("number").and_then(Value::as_u32) {
            Some(number) => number,
            None => return,
        };
        let index = match self.by_number.get(&number) {
            Some(index) => *index,
            None => {
                self.frames.push(Frame::new(number));
                self.by_number.insert(number, self.frames.len() - 1);
                self.frames.len() - 1
            }
        };
        let frame = &mut self.frames[index];
        match event_type_index {
            0 => {
                frame.start_event_id = Some(it.index());
                frame.time = Some(it.time());
            }
            _ => {
                frame.end_event_id = Some(it.index());
                frame.end_time = Some(it.time());
            }
        }
    }

    fn end_rebuild(&mut self, _: &EventList) {
        self.frames.retain(Frame::is_complete);
        self.by_number.clear();
        for (ordinal, frame) in self.frames.iter_mut().enumerate() {
            frame.ordinal = ordinal;
            self.by_number.insert(frame.number, ordinal);
        }
        self.notifier.emit(Invalidated);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::AncillaryHandle;
    use std::sync::Mutex;
    use wtf_trace_types::Arguments;

    #[test]
    fn test_frames() {
        let mut table = EventTypeTable::new();
        let start = table.define_type(BuiltinEvent::FrameStart.definition());
        let end = table.define_type(BuiltinEvent::FrameEnd.definition());
        let frames = Arc::new(Mutex::new(FrameList::new()));

        let mut list = EventList::new();
        let number = |n: u32| Some(Arguments::new().with("number", n));
        list.insert(start.clone(), 0.0, number(1));
        list.insert(end.clone(), 16.0, number(1));
        list.insert(start.clone(), 17.0, number(2));
        list.insert(end.clone(), 33.0, number(2));
        list.insert(end, 40.0, number(3));
        list.insert(start, 50.0, number(4));
        list.rebuild(&mut table);
        // registering on a populated list rebuilds right away
        list.register_ancillary_list(frames.clone() as AncillaryHandle, &table);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        let first = frames.get_frame(1).unwrap();
        assert_eq!(first.ordinal(), 0);
        assert_eq!(first.duration(), 16.0);
        assert!(frames.get_frame(3).is_none());
        assert!(frames.get_frame(4).is_none());
        assert_eq!(frames.get_next_frame(first).map(Frame::number), Some(2));
        assert!(frames.get_previous_frame(first).is_none());

        assert_eq!(frames.get_frame_at_time(20.0).map(Frame::number), Some(2));
        assert!(frames.get_frame_at_time(16.5).is_none());
        let (previous, next) = frames.get_intra_frame_at_time(16.5);
        assert_eq!(previous.map(Frame::number), Some(1));
        assert_eq!(next.map(Frame::number), Some(2));
        let (previous, next) = frames.get_intra_frame_at_time(-1.0);
        assert!(previous.is_none());
        assert_eq!(next.map(Frame::number), Some(1));

        let mut seen = Vec::new();
        frames.for_each_intersecting(10.0, 20.0, |f| seen.push(f.number()));
        assert_eq!(seen, vec![1, 2]);
    }
}
