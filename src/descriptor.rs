use splists_util::QualifiedName;
use std::collections::HashMap;

use crate::{error::Error, field::FieldDescriptor};

/// Request and response shape of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    operation: String,
    soap_action: String,
    request_root: QualifiedName,
    request_fields: Vec<FieldDescriptor>,
    response_root: QualifiedName,
    response_result: Option<FieldDescriptor>,
}

impl MessageDescriptor {
    /// Request root is `{namespace}operation`, response root is
    /// `{namespace}operationResponse`. The action is stored verbatim.
    pub fn new<O: Into<String>, A: Into<String>>(
        namespace: &str,
        operation: O,
        soap_action: A,
    ) -> Self {
        let operation = operation.into();

        Self {
            request_root: QualifiedName::new(namespace, operation.as_str()),
            response_root: QualifiedName::new(namespace, format!("{}Response", operation)),
            operation,
            soap_action: soap_action.into(),
            request_fields: Vec::new(),
            response_result: None,
        }
    }

    pub fn request_field(mut self, field: FieldDescriptor) -> Self {
        self.request_fields.push(field);
        self
    }

    pub fn result(mut self, field: FieldDescriptor) -> Self {
        self.response_result = Some(field);
        self
    }

    pub fn with_request_root(mut self, root: QualifiedName) -> Self {
        self.request_root = root;
        self
    }

    pub fn with_response_root(mut self, root: QualifiedName) -> Self {
        self.response_root = root;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn soap_action(&self) -> &str {
        &self.soap_action
    }

    pub fn request_root(&self) -> &QualifiedName {
        &self.request_root
    }

    pub fn request_fields(&self) -> &[FieldDescriptor] {
        &self.request_fields
    }

    pub fn response_root(&self) -> &QualifiedName {
        &self.response_root
    }

    pub fn response_result(&self) -> Option<&FieldDescriptor> {
        self.response_result.as_ref()
    }

    pub fn response_fields(&self) -> &[FieldDescriptor] {
        match &self.response_result {
            Some(result) => std::slice::from_ref(result),
            None => &[],
        }
    }

    /// Finds a request field by local name, including trailing siblings.
    pub fn find_request_field(&self, name: &str) -> Option<&FieldDescriptor> {
        find_field(&self.request_fields, name)
    }
}

pub(crate) fn find_field<'a>(
    fields: &'a [FieldDescriptor],
    name: &str,
) -> Option<&'a FieldDescriptor> {
    fields.iter().find_map(|field| {
        if field.local_name() == name {
            Some(field)
        } else {
            field.trailing().filter(|trailing| trailing.local_name() == name)
        }
    })
}

/// Operation name to descriptor. Filled once, then only read.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, MessageDescriptor>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: MessageDescriptor) {
        let name = descriptor.operation().to_owned();
        if self.operations.contains_key(&name) {
            log::warn!("operation `{}` registered twice, keeping the later descriptor", name);
        }

        self.operations.insert(name, descriptor);
    }

    pub fn with(mut self, descriptor: MessageDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn lookup(&self, operation: &str) -> Result<&MessageDescriptor, Error> {
        self.operations
            .get(operation)
            .ok_or_else(|| Error::UnknownOperation {
                operation: operation.to_owned(),
            })
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered operation names, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
