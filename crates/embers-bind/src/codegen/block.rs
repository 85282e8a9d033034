const INDENT: &str = "    ";

/// A block of generated source lines with managed indentation.
#[derive(Clone, Debug, Default)]
pub struct CodeGenBlock {
    code: String,
    indent: usize,
}

impl CodeGenBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at `indent` levels, e.g. for a block that is pasted into a
    /// function body.
    pub fn indented(indent: usize) -> Self {
        Self {
            code: String::new(),
            indent,
        }
    }

    pub fn append_line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
        self.code.push_str(line.as_ref());
        self.code.push('\n');
    }

    pub fn append_statement(&mut self, statement: impl AsRef<str>) {
        self.append_line(format!("{};", statement.as_ref()));
    }

    pub fn empty_line(&mut self) {
        self.code.push('\n');
    }

    pub fn begin_block(&mut self) {
        self.append_line("{");
        self.indent += 1;
    }

    pub fn end_block(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.append_line("}");
    }

    pub fn begin_struct(&mut self, name: impl AsRef<str>) {
        self.append_line(format!("struct {}", name.as_ref()));
        self.begin_block();
    }

    pub fn end_struct(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.append_line("};");
    }

    pub fn declare(&mut self, ty: impl AsRef<str>, name: impl AsRef<str>) {
        self.append_statement(format!("{} {}", ty.as_ref(), name.as_ref()));
    }

    pub fn assign(&mut self, target: impl AsRef<str>, value: impl AsRef<str>) {
        self.append_statement(format!("{} = {}", target.as_ref(), value.as_ref()));
    }

    pub fn finish(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for CodeGenBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// `_t_a__b` for the path `a.b`.
pub fn call_data_type_name(path: &str) -> String {
    format!("_t_{}", path.replace('.', "__"))
}
