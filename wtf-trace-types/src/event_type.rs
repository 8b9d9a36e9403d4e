use crate::{
    Arguments, BufferReader, BufferWriter, BuiltinEvent, CodecErr, CodecResult, Signature,
    SignatureErr, Value, Variable,
};
use std::{fmt::Display, ops::BitOr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventClass {
    Instance = 0,
    Scope = 1,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
/// Bitmask describing how an event type is recorded and displayed.
pub struct EventFlags(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything needed to define an event type.
pub struct EventTypeDef {
    pub name: String,
    pub class: EventClass,
    pub flags: EventFlags,
    pub args: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An event type registered in an [`crate::EventTypeTable`]. Immutable once defined.
pub struct EventType {
    id: u32,
    name: String,
    class: EventClass,
    flags: EventFlags,
    args: Vec<Variable>,
    builtin: Option<BuiltinEvent>,
}

impl EventClass {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Instance),
            1 => Some(Self::Scope),
            _ => None,
        }
    }
}

impl EventFlags {
    /// Event is expected to occur at a very high frequency.
    pub const HIGH_FREQUENCY: Self = Self(1 << 1);
    /// Scope time is attributed to the system rather than user code.
    pub const SYSTEM_TIME: Self = Self(1 << 2);
    /// Event is hidden from the user.
    pub const INTERNAL: Self = Self(1 << 3);
    /// Arguments are appended to the enclosing scope.
    pub const APPEND_SCOPE_DATA: Self = Self(1 << 4);
    /// Event is one of the built-in control events.
    pub const BUILTIN: Self = Self(1 << 5);
    /// Arguments are appended to the enclosing flow.
    pub const APPEND_FLOW_DATA: Self = Self(1 << 6);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for EventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl EventTypeDef {
    pub fn new<S: Into<String>>(
        name: S,
        class: EventClass,
        flags: EventFlags,
        args: Vec<Variable>,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            flags,
            args,
        }
    }

    /// Defines an instance event from a signature like `foo(uint32 x)`.
    pub fn instance(signature: &str, flags: EventFlags) -> Result<Self, SignatureErr> {
        Self::parse(signature, EventClass::Instance, flags)
    }

    /// Defines a scope event from a signature like `foo#bar(ascii name)`.
    pub fn scope(signature: &str, flags: EventFlags) -> Result<Self, SignatureErr> {
        Self::parse(signature, EventClass::Scope, flags)
    }

    pub fn parse(signature: &str, class: EventClass, flags: EventFlags) -> Result<Self, SignatureErr> {
        let Signature { name, args } = Signature::parse(signature)?;
        Ok(Self {
            name,
            class,
            flags,
            args,
        })
    }

    pub fn signature(&self) -> String {
        Signature {
            name: self.name.clone(),
            args: self.args.clone(),
        }
        .to_string()
    }

    /// Reads the argument payload laid out by this definition, which may differ
    /// from the one registered under the same name.
    pub fn read_arguments(&self, reader: &mut BufferReader) -> CodecResult<Option<Arguments>> {
        read_arguments(&self.args, reader)
    }
}

fn read_arguments(vars: &[Variable], reader: &mut BufferReader) -> CodecResult<Option<Arguments>> {
    if vars.is_empty() {
        return Ok(None);
    }
    let mut args = Arguments::with_capacity(vars.len());
    for var in vars.iter() {
        let value = var.read_from(reader)?;
        args.set(var.name.as_str(), value);
    }
    Ok(Some(args))
}

impl EventType {
    pub(crate) fn new(id: u32, def: EventTypeDef) -> Self {
        let builtin = BuiltinEvent::from_name(&def.name);
        Self {
            id,
            name: def.name,
            class: def.class,
            flags: def.flags,
            args: def.args,
            builtin,
        }
    }

    /// Session-local identifier; never zero.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    pub fn args(&self) -> &[Variable] {
        &self.args
    }

    pub fn has_args(&self) -> bool {
        !self.args.is_empty()
    }

    pub fn builtin(&self) -> Option<BuiltinEvent> {
        self.builtin
    }

    pub fn is_scope(&self) -> bool {
        self.class == EventClass::Scope
    }

    pub fn is_instance(&self) -> bool {
        self.class == EventClass::Instance
    }

    /// Internal and built-in events are not shown to users.
    pub fn is_hidden(&self) -> bool {
        self.flags
            .intersects(EventFlags::INTERNAL | EventFlags::BUILTIN)
    }

    pub fn signature(&self) -> String {
        self.to_def().signature()
    }

    pub fn to_def(&self) -> EventTypeDef {
        EventTypeDef {
            name: self.name.clone(),
            class: self.class,
            flags: self.flags,
            args: self.args.clone(),
        }
    }

    /// Whether `def` describes the same type as `self`.
    pub fn matches(&self, def: &EventTypeDef) -> bool {
        self.name == def.name
            && self.class == def.class
            && self.flags == def.flags
            && self.args == def.args
    }

    /// Reads the argument payload. Types without arguments yield `None`.
    pub fn read_arguments(&self, reader: &mut BufferReader) -> CodecResult<Option<Arguments>> {
        read_arguments(&self.args, reader)
    }

    /// Writes every declared argument in order. Missing arguments are an error.
    pub fn write_arguments(&self, writer: &mut BufferWriter, args: &Arguments) -> CodecResult<()> {
        for var in self.args.iter() {
            let value = args
                .get(&var.name)
                .ok_or_else(|| CodecErr::MissingArgument(var.name.clone()))?;
            var.write_to(writer, value)?;
        }
        Ok(())
    }

    pub fn size_of_arguments(&self, args: &Arguments) -> usize {
        self.args
            .iter()
            .map(|var| var.size_of(args.get(&var.name).unwrap_or(&Value::Null)))
            .sum()
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature())
    }
}
