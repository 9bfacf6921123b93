use splists_util::{soap::SoapFault, QualifiedName, XmlElement};
use std::{collections::HashMap, error::Error as StdError, fmt};

pub type FaultPayload = Box<dyn StdError + Send + Sync>;

/// Turns a fault detail element into a typed payload. Returning `None` makes
/// the dispatcher fall back to the raw fault.
pub type FaultDecoder = fn(&XmlElement) -> Option<FaultPayload>;

/// A fault whose detail root had a registered decoder.
#[derive(Debug)]
pub struct TypedFault {
    pub name: QualifiedName,
    pub raw: SoapFault,
    pub payload: FaultPayload,
}

impl TypedFault {
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

#[derive(Debug)]
pub enum Fault {
    Typed(TypedFault),
    Raw(SoapFault),
}

impl Fault {
    pub fn raw(&self) -> &SoapFault {
        match self {
            Fault::Typed(typed) => &typed.raw,
            Fault::Raw(raw) => raw,
        }
    }

    pub fn code(&self) -> &str {
        &self.raw().code
    }

    pub fn message(&self) -> &str {
        &self.raw().message
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, Fault::Typed(_))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Typed(typed) => write!(f, "{} fault: {}", typed.name, typed.payload),
            Fault::Raw(raw) => write!(f, "SOAP fault {}: {}", raw.code, raw.message),
        }
    }
}

/// Fault detail root name to decoder.
#[derive(Clone, Default)]
pub struct FaultRegistry {
    decoders: HashMap<QualifiedName, FaultDecoder>,
}

impl fmt::Debug for FaultRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: QualifiedName, decoder: FaultDecoder) {
        if self.decoders.insert(name.clone(), decoder).is_some() {
            log::warn!("fault decoder for {} registered twice", name);
        }
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Never fails: anything not registered, or rejected by its decoder, comes
    /// back as the raw fault.
    pub fn dispatch(&self, raw: SoapFault) -> Fault {
        let root = match raw.detail_root() {
            Some(root) => root,
            None => return Fault::Raw(raw),
        };

        let decoder = match self.decoders.get(&root.name) {
            Some(decoder) => decoder,
            None => {
                log::debug!("no fault decoder for {}", root.name);
                return Fault::Raw(raw);
            }
        };

        match decoder(root) {
            Some(payload) => Fault::Typed(TypedFault {
                name: root.name.clone(),
                payload,
                raw,
            }),
            None => {
                log::debug!("fault decoder for {} declined the detail", root.name);
                Fault::Raw(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    const NS: &str = "http://schemas.microsoft.com/sharepoint/soap/";

    #[derive(Debug, Error)]
    #[error("{message} ({code})")]
    struct SharePointError {
        code: String,
        message: String,
    }

    fn decode_sharepoint(detail: &XmlElement) -> Option<FaultPayload> {
        let message = detail.text();
        Some(Box::new(SharePointError {
            code: "0x82000006".to_owned(),
            message,
        }))
    }

    fn fault_with(root: &str) -> SoapFault {
        SoapFault::new("soap:Server", "Exception was thrown.").with_detail(
            XmlElement::new("detail".into()).with_child(
                XmlElement::new(QualifiedName::new(NS, root)).with_text("List does not exist."),
            ),
        )
    }

    #[test]
    fn unregistered_faults_pass_through_unchanged() {
        let raw = fault_with("errorstring");
        match FaultRegistry::new().dispatch(raw.clone()) {
            Fault::Raw(fault) => assert_eq!(fault, raw),
            other => panic!("expected a raw fault, got {:?}", other),
        }
    }

    #[test]
    fn faults_without_detail_are_raw() {
        let mut registry = FaultRegistry::new();
        registry.register(QualifiedName::new(NS, "errorstring"), decode_sharepoint);

        let fault = registry.dispatch(SoapFault::new("soap:Client", "bad"));
        assert!(!fault.is_typed());
        assert_eq!(fault.code(), "soap:Client");
        assert_eq!(fault.message(), "bad");
    }

    #[test]
    fn registered_faults_are_decoded() {
        let mut registry = FaultRegistry::new();
        registry.register(QualifiedName::new(NS, "errorstring"), decode_sharepoint);

        let fault = registry.dispatch(fault_with("errorstring"));
        let typed = match &fault {
            Fault::Typed(typed) => typed,
            other => panic!("expected a typed fault, got {:?}", other),
        };

        let payload = typed.downcast_ref::<SharePointError>().unwrap();
        assert_eq!(payload.message, "List does not exist.");
        assert_eq!(fault.code(), "soap:Server");
        assert!(fault.to_string().contains("List does not exist."));
    }

    #[test]
    fn declining_decoder_falls_back() {
        let mut registry = FaultRegistry::new();
        registry.register(QualifiedName::new(NS, "errorstring"), |_| None);
        assert!(!registry.dispatch(fault_with("errorstring")).is_typed());
    }
}
