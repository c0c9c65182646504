use sqlembed::{format_document, DocumentKind, Mode};
use std::hint::black_box;

fn main() {
    let source = std::fs::read_to_string("tests/data/python/200_marked_strings.py")
        .expect("failed to read test file");
    let source = source.repeat(200);

    let mode = Mode::default();

    for _ in 0..500 {
        let result = format_document(black_box(&source), DocumentKind::Host, black_box(&mode));
        black_box(result).ok();
    }
}
