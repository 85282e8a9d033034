//! Emission of the kernel source that binds call data to the target
//! function.

mod block;

use std::collections::BTreeMap;

use askama::Template;

pub use self::block::{
    call_data_type_name,
    CodeGenBlock,
};
use crate::error::GenerationError;

/// Collects the sections of a generated kernel.
#[derive(Debug)]
pub struct CodeGen {
    call_dimensionality: usize,
    thread_group_size: u32,
    imports: Vec<String>,
    snippets: BTreeMap<String, String>,

    /// Per-variable call data structs.
    pub call_data_structs: CodeGenBlock,

    /// Fields of the `CallData` record.
    pub call_data: CodeGenBlock,

    pub trampoline: CodeGenBlock,

    /// Body of the compute entry point, after the call coordinate is known.
    pub kernel: CodeGenBlock,
}

impl CodeGen {
    pub fn new(call_dimensionality: usize, thread_group_size: u32) -> Self {
        Self {
            call_dimensionality,
            thread_group_size,
            imports: vec![],
            snippets: BTreeMap::new(),
            call_data_structs: CodeGenBlock::new(),
            call_data: CodeGenBlock::indented(1),
            trampoline: CodeGenBlock::new(),
            kernel: CodeGenBlock::indented(1),
        }
    }

    /// Length of the call coordinate array. A 0-dimensional call still has
    /// one coordinate, which is always 0.
    pub fn call_rank(&self) -> usize {
        self.call_dimensionality.max(1)
    }

    pub fn add_import(&mut self, module: impl ToString) {
        let module = module.to_string();
        if !self.imports.contains(&module) {
            self.imports.push(module);
        }
    }

    /// Adds a helper snippet once, no matter how many variables need it.
    pub fn add_snippet(&mut self, name: &str, code: impl FnOnce() -> String) {
        if !self.snippets.contains_key(name) {
            self.snippets.insert(name.to_owned(), code());
        }
    }

    pub fn finish(&self) -> Result<String, GenerationError> {
        let template = KernelTemplate {
            imports: &self.imports,
            snippets: self.snippets.values().map(String::as_str).collect(),
            call_data_structs: self.call_data_structs.finish(),
            call_data_fields: self.call_data.finish(),
            call_rank: self.call_rank(),
            trampoline: self.trampoline.finish(),
            thread_group_size: self.thread_group_size,
            kernel: self.kernel.finish(),
        };

        let source = template.render()?;

        tracing::debug!("generated kernel source");
        tracing::debug!("{source}");

        Ok(source)
    }
}

#[derive(Debug, Template)]
#[template(path = "kernel.slang", escape = "none")]
struct KernelTemplate<'a> {
    imports: &'a [String],
    snippets: Vec<&'a str>,
    call_data_structs: &'a str,
    call_data_fields: &'a str,
    call_rank: usize,
    trampoline: &'a str,
    thread_group_size: u32,
    kernel: &'a str,
}
