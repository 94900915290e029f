//! Structured model of a compiled-code container and its byte codec.
//!
//! The differ only needs what goes into a class fingerprint: declarations,
//! flags, and each method's register count and opcode stream. Everything
//! format-specific lives behind [`ContainerCodec`].

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// One compiled-code unit: a named bundle of class definitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeContainer {
    pub classes: Vec<ClassDef>,
}

impl CodeContainer {
    pub fn new(classes: Vec<ClassDef>) -> Self {
        Self { classes }
    }

    /// Class identifiers in declaration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.classes.iter().map(ClassDef::identifier).collect()
    }

    pub fn find(&self, identifier: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.identifier() == identifier)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A single class definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Raw type descriptor, e.g. `Lcom/example/Foo;`.
    pub type_descriptor: String,
    pub access_flags: u32,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn new(type_descriptor: impl Into<String>) -> Self {
        Self {
            type_descriptor: type_descriptor.into(),
            access_flags: 0x0001,
            superclass: Some("Ljava/lang/Object;".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Fully-qualified identifier: `Lcom/example/Foo;` becomes `com.example.Foo`.
    pub fn identifier(&self) -> String {
        descriptor_to_identifier(&self.type_descriptor)
    }

    pub fn with_access_flags(mut self, flags: u32) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn with_superclass(mut self, superclass: Option<&str>) -> Self {
        self.superclass = superclass.map(str::to_string);
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }
}

/// Convert a `L...;` type descriptor into a dotted class identifier.
/// Anything else is returned unchanged.
pub fn descriptor_to_identifier(descriptor: &str) -> String {
    match descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
    {
        Some(inner) => inner.replace('/', "."),
        None => descriptor.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub type_descriptor: String,
    pub access_flags: u32,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_descriptor: impl Into<String>, access_flags: u32) -> Self {
        Self {
            name: name.into(),
            type_descriptor: type_descriptor.into(),
            access_flags,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub access_flags: u32,
    /// Absent for abstract and native methods.
    pub code: Option<CodeItem>,
}

impl MethodDef {
    pub fn new(
        name: impl Into<String>,
        parameter_types: &[&str],
        return_type: impl Into<String>,
        access_flags: u32,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_types: parameter_types.iter().map(|p| p.to_string()).collect(),
            return_type: return_type.into(),
            access_flags,
            code: None,
        }
    }

    pub fn with_code(mut self, register_count: u16, instructions: Vec<Instruction>) -> Self {
        self.code = Some(CodeItem {
            register_count,
            instructions,
        });
        self
    }
}

/// Method body: register count plus instruction stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeItem {
    pub register_count: u16,
    pub instructions: Vec<Instruction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub operands: Vec<u32>,
}

impl Instruction {
    pub fn new(opcode: u8, operands: &[u32]) -> Self {
        Self {
            opcode,
            operands: operands.to_vec(),
        }
    }
}

/// Byte encoding of a [`CodeContainer`].
///
/// `name` is only used for error context.
pub trait ContainerCodec: Send + Sync {
    fn decode(&self, name: &str, bytes: &[u8]) -> DiffResult<CodeContainer>;

    fn encode(&self, name: &str, container: &CodeContainer) -> DiffResult<Vec<u8>>;
}

impl<C: ContainerCodec + ?Sized> ContainerCodec for Box<C> {
    fn decode(&self, name: &str, bytes: &[u8]) -> DiffResult<CodeContainer> {
        (**self).decode(name, bytes)
    }

    fn encode(&self, name: &str, container: &CodeContainer) -> DiffResult<Vec<u8>> {
        (**self).encode(name, container)
    }
}

/// Default codec: `HPCU` magic, big-endian `u32` format version, bincode body.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub const MAGIC: &'static [u8; 4] = b"HPCU";
    pub const VERSION: u32 = 1;
    const HEADER_LEN: usize = 8;
}

impl ContainerCodec for BincodeCodec {
    fn decode(&self, name: &str, bytes: &[u8]) -> DiffResult<CodeContainer> {
        let malformed = |reason: String| DiffError::MalformedContainer {
            container: name.to_string(),
            reason,
        };

        if bytes.len() < Self::HEADER_LEN {
            return Err(malformed(format!("truncated header ({} bytes)", bytes.len())));
        }
        if &bytes[..4] != Self::MAGIC {
            return Err(malformed(format!("bad magic {:02x?}", &bytes[..4])));
        }
        let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != Self::VERSION {
            return Err(malformed(format!("unsupported format version {version}")));
        }

        bincode::deserialize(&bytes[Self::HEADER_LEN..]).map_err(|e| malformed(e.to_string()))
    }

    fn encode(&self, name: &str, container: &CodeContainer) -> DiffResult<Vec<u8>> {
        let body = bincode::serialize(container).map_err(|e| DiffError::Encode {
            container: name.to_string(),
            reason: e.to_string(),
        })?;
        let mut out = Vec::with_capacity(Self::HEADER_LEN + body.len());
        out.extend_from_slice(Self::MAGIC);
        out.extend_from_slice(&Self::VERSION.to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}
