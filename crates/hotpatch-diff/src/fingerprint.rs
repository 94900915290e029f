//! Class-structure hasher.
//!
//! A fingerprint covers a class's declaration (descriptor, flags,
//! superclass, interfaces), its field signatures, and its method signatures
//! including a digest of each method's register count and opcode sequence.
//! Every list is sorted before hashing, so declaration order never affects
//! the result. Instruction operands are not hashed.

use std::collections::BTreeMap;

use hotpatch_crypto::ContentHasher;
use hotpatch_types::ContentId;
use tracing::warn;

use crate::container::{ClassDef, CodeContainer, CodeItem, FieldDef, MethodDef};

/// Digest of one method body: register count followed by the opcode stream.
pub fn method_digest(code: &CodeItem) -> ContentId {
    let mut hasher = ContentHasher::METHOD.start();
    hasher.update(&code.register_count.to_be_bytes());
    for insn in &code.instructions {
        hasher.update(&[insn.opcode]);
    }
    hasher.finish()
}

fn field_signature(field: &FieldDef) -> String {
    format!("{}:{}:{}", field.name, field.type_descriptor, field.access_flags)
}

fn method_signature(method: &MethodDef) -> String {
    let mut params = method.parameter_types.clone();
    params.sort();
    let body = match &method.code {
        Some(code) => method_digest(code).to_hex(),
        None => "-".to_string(),
    };
    format!(
        "{}({}){}:{}:{}",
        method.name,
        params.join(","),
        method.return_type,
        method.access_flags,
        body
    )
}

/// Compute the structural fingerprint of one class.
pub fn class_fingerprint(class: &ClassDef) -> ContentId {
    let mut interfaces: Vec<&str> = class.interfaces.iter().map(String::as_str).collect();
    interfaces.sort_unstable();
    let mut fields: Vec<String> = class.fields.iter().map(field_signature).collect();
    fields.sort_unstable();
    let mut methods: Vec<String> = class.methods.iter().map(method_signature).collect();
    methods.sort_unstable();

    let mut hasher = ContentHasher::CLASS.start();
    hasher
        .update_field(class.type_descriptor.as_bytes())
        .update_field(&class.access_flags.to_be_bytes())
        .update_field(class.superclass.as_deref().unwrap_or("").as_bytes());

    hasher.update(&(interfaces.len() as u64).to_be_bytes());
    for interface in &interfaces {
        hasher.update_field(interface.as_bytes());
    }
    hasher.update(&(fields.len() as u64).to_be_bytes());
    for field in &fields {
        hasher.update_field(field.as_bytes());
    }
    hasher.update(&(methods.len() as u64).to_be_bytes());
    for method in &methods {
        hasher.update_field(method.as_bytes());
    }
    hasher.finish()
}

/// Fingerprint every class in a container, keyed by class identifier.
pub fn fingerprint_container(container: &CodeContainer) -> BTreeMap<String, ContentId> {
    let mut map = BTreeMap::new();
    for class in &container.classes {
        let identifier = class.identifier();
        if map.insert(identifier.clone(), class_fingerprint(class)).is_some() {
            warn!(class = %identifier, "duplicate class definition, keeping the last one");
        }
    }
    map
}
