use docxide_layout::breaker::LineBreaker;
use docxide_layout::metrics::{TextMetrics, TextStyle};

fn style() -> TextStyle {
    TextStyle::new("Arial", 10.0)
}

#[test]
fn single_word_too_wide_is_kept_on_its_own_line() {
    let metrics = TextMetrics::approximate();
    let lines = LineBreaker::default().break_text(&metrics, "superlongwordwithnowhitespace", &style(), 1.0);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text, "superlongwordwithnowhitespace");
    assert!(lines[0].width > 1.0);

    let layout = metrics.layout_text("superlongwordwithnowhitespace", &style(), Some(1.0));
    assert_eq!(layout.line_count, 1);
    assert_eq!(layout.lines, vec!["superlongwordwithnowhitespace"]);
}

#[test]
fn wrapping_never_loses_text() {
    let metrics = TextMetrics::approximate();
    let inputs = [
        "",
        "Hello world",
        "  leading and trailing  ",
        "The quick brown fox jumps over the lazy dog",
        "tabs\tand\ttabs",
        "line one\nline two\n\nline four",
        "hy\u{AD}phen\u{AD}ated words with soft\u{AD}hyphens",
        "unicode: æøå €uro “quotes” … ellipsis",
        "x",
    ];
    for hyphenate in [false, true] {
        let breaker = LineBreaker::new(hyphenate);
        for text in inputs {
            for max_width in [0.5, 1.0, 7.0, 30.0, 100.0, 1000.0] {
                let lines = breaker.break_text(&metrics, text, &style(), max_width);
                assert!(!lines.is_empty(), "no lines for {text:?} at {max_width}");
                let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
                assert_eq!(joined, text, "hyphenate={hyphenate} width={max_width}");
            }
        }
    }
}

#[test]
fn lines_respect_the_width_when_words_fit() {
    let metrics = TextMetrics::approximate();
    let text = "aa bb cc dd ee ff gg";
    let lines = LineBreaker::default().break_text(&metrics, text, &style(), 30.0);
    // Each word is 12pt wide, a space 6pt: two words per line
    assert_eq!(lines.len(), 4);
    for line in &lines {
        assert!(line.width <= 30.0 + 0.01, "{line:?}");
    }
    assert_eq!(lines[0].display_text(), "aa bb");
    assert_eq!(lines[3].display_text(), "gg");
}

#[test]
fn newlines_force_breaks() {
    let metrics = TextMetrics::approximate();
    let lines = LineBreaker::default().break_text(&metrics, "one\ntwo", &style(), 1000.0);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].display_text(), "one");
    assert_eq!(lines[1].display_text(), "two");
}

#[test]
fn soft_hyphens_break_only_when_enabled() {
    let metrics = TextMetrics::approximate();
    let word = "hy\u{AD}phen\u{AD}ation";

    let plain = LineBreaker::new(false).break_text(&metrics, word, &style(), 40.0);
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].display_text(), "hyphenation");

    let hyphenated = LineBreaker::new(true).break_text(&metrics, word, &style(), 40.0);
    let shown: Vec<String> = hyphenated.iter().map(|l| l.display_text()).collect();
    assert_eq!(shown, vec!["hy-", "phen-", "ation"]);
    assert!(hyphenated[0].hyphenated);
    assert!(!hyphenated[2].hyphenated);
    // The drawn hyphen counts towards the width
    assert!((hyphenated[0].width - 18.0).abs() < 1e-3);
}

#[test]
fn empty_text_measures_one_line() {
    let metrics = TextMetrics::approximate();
    let measure = metrics.measure_text("", &style());
    assert_eq!(measure.line_count, 1);
    assert_eq!(measure.width, 0.0);
    assert!((measure.height - style().line_height()).abs() < 1e-3);
}
