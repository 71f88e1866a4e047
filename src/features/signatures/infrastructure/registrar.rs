/*
 * Signature trait and registrar
 *
 * A signature accepts or rejects a call site; accepting means its flow
 * records may be used as the summary for the call. The registrar keeps
 * signatures in registration order and uses the first acceptor. The
 * default registration ends with a catch-all, so an exhausted registrar is
 * a configuration error, not an expected condition.
 */

use tracing::trace;

use super::library::{ArgsToRet, OverflowChecks};
use super::stdlib::StdLib;
use crate::errors::{InfoflowError, Result};
use crate::features::infoflow::domain::ContextId;
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{CallSite, Module};

/// The public interface of an information flow signature.
pub trait Signature: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Is this signature valid for the given call site?
    fn accept(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> bool;

    /// Summarize the information flows of the call. Only invoked when
    /// `accept` returned true for the same call site.
    fn process(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> Vec<FlowRecord>;
}

/// Ordered collection of signatures; first acceptor wins.
#[derive(Default)]
pub struct SignatureRegistrar {
    sigs: Vec<Box<dyn Signature>>,
}

impl SignatureRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production registration: overflow checks, the stdlib table,
    /// then the args-to-return catch-all.
    pub fn with_default_signatures() -> Self {
        let mut registrar = Self::new();
        registrar.register(Box::new(OverflowChecks));
        registrar.register(Box::new(StdLib::new()));
        registrar.register(Box::new(ArgsToRet));
        registrar
    }

    pub fn register(&mut self, sig: Box<dyn Signature>) {
        self.sigs.push(sig);
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// Summary flows for a call site, from the first accepting signature.
    pub fn process(
        &self,
        module: &Module,
        ctxt: ContextId,
        cs: &CallSite<'_>,
    ) -> Result<Vec<FlowRecord>> {
        for sig in &self.sigs {
            if sig.accept(module, ctxt, cs) {
                trace!(signature = sig.name(), callee = %module.value(cs.callee).name, "signature matched");
                return Ok(sig.process(module, ctxt, cs));
            }
        }
        Err(InfoflowError::NoMatchingSignature {
            callee: module.value(cs.callee).name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ModuleBuilder, Type};

    fn call_to(name: &str) -> (Module, crate::shared::models::InstId) {
        let mut mb = ModuleBuilder::new("m");
        let ext = mb.declare_function(name, &[Type::Int], Type::Int, false);
        let f = mb.begin_function("caller", &[("x", Type::Int)], Type::Int, false);
        let bb = mb.add_block(f, "entry");
        let x = mb.param(f, 0);
        let callee = mb.function_value(ext);
        let r = mb.call(bb, callee, vec![x], Type::Int);
        mb.ret(bb, Some(r));
        let m = mb.finish();
        let site = m.call_sites_in(m.function_by_name("caller").unwrap().id)[0];
        (m, site)
    }

    #[test]
    fn test_first_acceptor_wins() {
        let (m, site) = call_to("____jf_check_add");
        let cs = m.call_site(site).unwrap();
        let registrar = SignatureRegistrar::with_default_signatures();
        let flows = registrar.process(&m, ContextId::DEFAULT, &cs).unwrap();
        // OverflowChecks answers with an implicit and an explicit record.
        assert_eq!(flows.len(), 2);
    }

    #[test]
    fn test_catch_all_accepts_unknown_calls() {
        let (m, site) = call_to("totally_unknown_fn");
        let cs = m.call_site(site).unwrap();
        let registrar = SignatureRegistrar::with_default_signatures();
        let flows = registrar.process(&m, ContextId::DEFAULT, &cs).unwrap();
        assert_eq!(flows.len(), 1, "args-to-ret emits one explicit record");
    }

    #[test]
    fn test_empty_registrar_is_an_error() {
        let (m, site) = call_to("anything");
        let cs = m.call_site(site).unwrap();
        let registrar = SignatureRegistrar::new();
        assert!(matches!(
            registrar.process(&m, ContextId::DEFAULT, &cs),
            Err(InfoflowError::NoMatchingSignature { .. })
        ));
    }
}
