//! Line wrapping and fitting of plain text runs.

use crate::metrics::{FontSpec, TextMeasure};

const ELLIPSIS: &str = "...";

/// Greedily wraps `text` into lines no wider than `max_width`.
///
/// Words are separated by whitespace and re-joined with single spaces. A word that is wider than
/// `max_width` on its own is emitted alone on its line instead of being split. Blank input yields
/// no lines.
pub fn wrap<M>(text: &str, max_width: f64, font: FontSpec, metrics: &M) -> Vec<String>
where
    M: TextMeasure + ?Sized,
{
    let mut lines = Vec::new();
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return lines;
    };

    let mut current = first.to_owned();
    for word in words {
        let candidate = format!("{} {}", current, word);
        if metrics.text_width(&candidate, font) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_owned()));
        }
    }
    lines.push(current);
    lines
}

/// Shortens `text` with a trailing ellipsis until it fits into `max_width`.
///
/// Used for single-line slots (banner cells, running headers) where wrapping would change the
/// fixed decoration geometry.
pub fn fit_to_width<M>(text: &str, max_width: f64, font: FontSpec, metrics: &M) -> String
where
    M: TextMeasure + ?Sized,
{
    if metrics.text_width(text, font) <= max_width {
        return text.to_owned();
    }

    let chars: Vec<char> = text.chars().collect();
    for keep in (0..chars.len()).rev() {
        let mut candidate: String = chars[..keep].iter().collect::<String>().trim_end().to_owned();
        candidate.push_str(ELLIPSIS);
        if metrics.text_width(&candidate, font) <= max_width {
            return candidate;
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;

    const FONT: FontSpec = FontSpec::regular(10);

    // Five points per character at size 10.
    fn metrics() -> FixedMetrics {
        FixedMetrics::default()
    }

    #[test]
    fn wraps_greedily_within_budget() {
        let lines = wrap("alpha beta gamma delta", 54.0, FONT, &metrics());
        assert_eq!(lines, vec!["alpha beta", "gamma", "delta"]);
        for line in &lines {
            assert!(metrics().text_width(line, FONT) <= 54.0);
        }
    }

    #[test]
    fn overlong_word_is_kept_whole_on_its_own_line() {
        let lines = wrap("a supercalifragilistic b", 30.0, FONT, &metrics());
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn collapses_whitespace_and_handles_blank_input() {
        assert_eq!(
            wrap("  one \n two\tthree ", 1000.0, FONT, &metrics()),
            vec!["one two three"]
        );
        assert!(wrap("   ", 100.0, FONT, &metrics()).is_empty());
    }

    #[test]
    fn wrapping_is_deterministic() {
        let text = "Renuncia de responsabilidad: este documento es de caracter informativo.";
        let first = wrap(text, 120.0, FONT, &metrics());
        let second = wrap(text, 120.0, FONT, &metrics());
        assert_eq!(first, second);
    }

    #[test]
    fn width_bound_holds_for_every_multi_word_line() {
        let text = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod \
                    tempor incididunt ut labore et dolore magna aliqua";
        for budget in [20.0, 45.0, 80.0, 133.0, 250.0] {
            for line in wrap(text, budget, FONT, &metrics()) {
                let single_word = !line.contains(' ');
                assert!(single_word || metrics().text_width(&line, FONT) <= budget);
            }
        }
    }

    #[test]
    fn fit_to_width_appends_ellipsis() {
        assert_eq!(fit_to_width("short", 100.0, FONT, &metrics()), "short");
        let fitted = fit_to_width("a rather long subject id", 50.0, FONT, &metrics());
        assert_eq!(fitted, "a rathe...");
        assert!(metrics().text_width(&fitted, FONT) <= 50.0);
    }
}
