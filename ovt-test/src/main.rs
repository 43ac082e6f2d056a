use std::process::ExitCode;
use std::{env, fs};

use ovt::{Font, FontFeatures, LayoutContext};

const DEFAULT_TEXT: &str = "Sphinx of black quartz, judge my vow.";

fn main() -> ExitCode {
    let mut args = env::args().skip(1);

    let Some(path) = args.next() else {
        eprintln!("usage: ovt-test <font-file> [text]");
        return ExitCode::FAILURE;
    };

    let text = args.next().unwrap_or_else(|| DEFAULT_TEXT.to_string());

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        },
    };

    let font = match Font::from_bytes(&bytes) {
        Ok(font) => font,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        },
    };

    if let Some(family) = font.family() {
        println!("Family: {}", family);
    }

    if let Some(subfamily) = font.subfamily() {
        println!("Subfamily: {}", subfamily);
    }

    if let Some(postscript_name) = font.postscript_name() {
        println!("PostScript name: {}", postscript_name);
    }

    let metrics = font.metrics();

    println!(
        "Glyphs: {}, Units/em: {}, Ascender: {}, Descender: {}, Line gap: {}",
        font.num_glyphs(),
        metrics.units_per_em,
        metrics.ascender,
        metrics.descender,
        metrics.line_gap
    );

    for mismatch in font.verify_checksums() {
        println!(
            "Checksum mismatch in '{}': stored {:#010x}, computed {:#010x}",
            tag_str(mismatch.table_tag),
            mismatch.stored,
            mismatch.computed
        );
    }

    let ctx = LayoutContext::default();
    let features = FontFeatures::default();
    let glyph_ids = text
        .chars()
        .map(|c| font.glyph_index(c))
        .collect::<Vec<_>>();

    let shaped = match font.substitute(&glyph_ids, &ctx, &features) {
        Ok(shaped) => shaped,
        Err(e) => {
            eprintln!("substitution failed: {}", e);
            glyph_ids
        },
    };

    println!("\n{:>6} {:>8} {:>6} {:>5}", "glyph", "advance", "kern", "ops");

    for (i, &glyph_id) in shaped.iter().enumerate() {
        let op_count = match font.glyph(glyph_id) {
            Ok(outline) => outline.ops.len(),
            Err(e) => {
                eprintln!("glyph {} failed: {}", glyph_id, e);
                continue;
            },
        };

        let next = shaped.get(i + 1).copied();
        let advance = font
            .advance(glyph_id, next, &ctx, &features)
            .unwrap_or_else(|_| font.advance_width(glyph_id) as i32);

        let kern = match next {
            Some(next) => {
                match font.kerning(glyph_id, next, &ctx) {
                    Ok((dx, _)) => dx,
                    Err(_) => 0,
                }
            },
            None => 0,
        };

        println!("{:>6} {:>8} {:>6} {:>5}", glyph_id, advance, kern, op_count);
    }

    ExitCode::SUCCESS
}

fn tag_str(tag: u32) -> String {
    tag.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}
