//! The per-unit translation driver.
//!
//! One `Translator` run serves exactly one translation unit: label counters
//! and segment allocators are unit-scoped, so a fresh run is required per
//! unit. Translation is all-or-nothing; a fatal error discards every byte of
//! accumulated output.

use log::debug;
use serde::Serialize;

use crate::ast::TranslationUnit;
use crate::codegen::{Generator, Layout};
use crate::error::Result;
use crate::options::Options;

/// The translated unit: target source text plus the static memory-layout
/// metadata consumed by the downstream runtime initializer.
#[derive(Debug, Serialize)]
pub struct Output {
    pub source: String,
    pub layout: Layout,
}

pub struct Translator {
    opts: Options,
}

impl Translator {
    pub fn new(opts: Options) -> Translator {
        Translator { opts }
    }

    pub fn translate(&self, unit: &TranslationUnit) -> Result<Output> {
        let mut gen = Generator::new(&self.opts, &unit.strings);
        gen.register_externs(&unit.decls);
        for d in &unit.decls {
            gen.define(d)?;
        }
        let (source, layout) = gen.finish();
        debug!(
            "translated unit: {} bytes of source, bss={}, ds={}",
            source.len(),
            layout.bss_len,
            layout.ds.len()
        );
        Ok(Output { source, layout })
    }
}
