//! Subtítulos ASS a partir de la alineación por carácter de la voz.
//!
//! Las palabras se agrupan en líneas cortas (`MAX_WORDS_PER_LINE`) y cada
//! línea se muestra desde el inicio de su primera palabra hasta el fin de la
//! última.

use crate::artifacts::CharAlignment;

pub const MAX_WORDS_PER_LINE: usize = 4;

const HEADER: &str = "[Script Info]
ScriptType: v4.00+
PlayResX: 1080
PlayResY: 1920

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BorderStyle, Outline, Shadow, Alignment, MarginV
Style: Default,Arial,72,&H00FFFFFF,&H00000000,1,4,0,2,400

[Events]
Format: Layer, Start, End, Style, Text
";

#[derive(Debug, Clone, PartialEq)]
struct Word {
    text: String,
    start: f64,
    end: f64,
}

fn words(alignment: &CharAlignment) -> Vec<Word> {
    let mut out: Vec<Word> = Vec::new();
    let mut current: Option<Word> = None;
    let times = alignment.character_start_times_seconds
                         .iter()
                         .zip(&alignment.character_end_times_seconds);
    for (ch, (&start, &end)) in alignment.characters.iter().zip(times) {
        if ch.trim().is_empty() {
            out.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(w) => {
                w.text.push_str(ch);
                w.end = end;
            }
            None => current = Some(Word { text: ch.clone(),
                                          start,
                                          end }),
        }
    }
    out.extend(current);
    out
}

/// `H:MM:SS.cc`
fn timestamp(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    let (h, rem) = (centis / 360_000, centis % 360_000);
    let (m, rem) = (rem / 6_000, rem % 6_000);
    format!("{h}:{m:02}:{:02}.{:02}", rem / 100, rem % 100)
}

pub fn render_ass(alignment: &CharAlignment) -> String {
    let mut out = String::from(HEADER);
    for line in words(alignment).chunks(MAX_WORDS_PER_LINE) {
        let (Some(first), Some(last)) = (line.first(), line.last()) else {
            continue;
        };
        let text: Vec<&str> = line.iter().map(|w| w.text.as_str()).collect();
        out.push_str(&format!("Dialogue: 0,{},{},Default,{}\n",
                              timestamp(first.start),
                              timestamp(last.end),
                              text.join(" ")));
    }
    out
}
