use std::cell::RefCell;
use std::rc::Rc;

const INDENT_SIZE: usize = 2;

pub struct BulletPointPrinter<W: LineWriter + Clone> {
    writer: W,
    nesting: usize,
}

impl<W: LineWriter + Clone> BulletPointPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, nesting: 0 }
    }

    pub fn print_item(&self, message: impl std::fmt::Display) {
        let indent = " ".repeat(self.nesting * INDENT_SIZE);
        self.writer.write_line(&format!("{}• {}", indent, message));
    }

    pub fn indent(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            nesting: self.nesting + 1,
        }
    }
}

impl BulletPointPrinter<StdoutLineWriter> {
    pub fn new_stdout() -> Self {
        Self::new(StdoutLineWriter)
    }
}

pub trait LineWriter {
    fn write_line(&self, line: &str);
}

#[derive(Clone, Copy)]
pub struct StdoutLineWriter;
impl LineWriter for StdoutLineWriter {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Collects lines in memory
#[derive(Clone, Default)]
pub struct BufferLineWriter {
    lines: Rc<RefCell<Vec<String>>>,
}

impl BufferLineWriter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl LineWriter for BufferLineWriter {
    fn write_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_items_are_indented() {
        let writer = BufferLineWriter::default();
        let printer = BulletPointPrinter::new(writer.clone());
        printer.print_item("Jane Doe");
        printer.indent().print_item("Checking");
        printer.indent().indent().print_item("$110.00");
        assert_eq!(
            vec!["• Jane Doe", "  • Checking", "    • $110.00"],
            writer.lines()
        );
    }
}
