//! Test doubles for the renderer capability.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::renderer::{
    InitError, RenderOptions, RenderOutput, Renderer, RendererFactory, ResourceSet,
};

/// Shared counter readable after the factory moved into a worker.
#[derive(Debug, Clone, Default)]
pub(crate) struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory for `MockRenderer`, counting constructions.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockFactory {
    constructions: Counter,
    renders: Counter,
    delay: Duration,
    fail_init: bool,
}

impl MockFactory {
    /// Every render sleeps this long first.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every construction fails.
    pub(crate) fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn constructions(&self) -> Counter {
        self.constructions.clone()
    }

    pub(crate) fn renders(&self) -> Counter {
        self.renders.clone()
    }
}

impl RendererFactory for MockFactory {
    fn init(&self, resources: &ResourceSet) -> Result<Box<dyn Renderer>, InitError> {
        self.constructions.bump();
        if self.fail_init {
            return Err(InitError::Other("font download failed".into()));
        }
        Ok(Box::new(MockRenderer {
            sources: FxHashMap::default(),
            assets: FxHashMap::default(),
            extended: resources.extended,
            delay: self.delay,
            renders: self.renders.clone(),
        }))
    }
}

/// Renders `MOCK <set>\n<text>` or fails on unbalanced markup.
pub(crate) struct MockRenderer {
    sources: FxHashMap<String, String>,
    assets: FxHashMap<String, Vec<u8>>,
    extended: bool,
    delay: Duration,
    renders: Counter,
}

impl Renderer for MockRenderer {
    fn reset(&mut self) {
        self.sources.clear();
        self.assets.clear();
    }

    fn register_source(&mut self, path: &str, text: &str) -> io::Result<()> {
        self.sources.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn register_asset(&mut self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.assets.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn render(&mut self, entry: &str, _options: &RenderOptions) -> RenderOutput {
        self.renders.bump();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let Some(text) = self.sources.get(entry) else {
            return RenderOutput {
                artifact: None,
                diagnostics: vec![format!("{entry}: file not found")],
            };
        };

        let errors = check_markup(entry, text);
        if !errors.is_empty() {
            return RenderOutput {
                artifact: None,
                diagnostics: errors,
            };
        }

        let mut diagnostics = Vec::new();
        for name in self.assets.keys() {
            if !text.contains(name.as_str()) {
                diagnostics.push(format!("{name}: warning: asset is never used"));
            }
        }

        let set = if self.extended { "extended" } else { "base" };
        let artifact = format!("MOCK {set}\n{text}").into_bytes();
        RenderOutput {
            artifact: Some(artifact),
            diagnostics,
        }
    }
}

/// Report unterminated `*`, `_`, `$` and unbalanced brackets.
fn check_markup(entry: &str, text: &str) -> Vec<String> {
    let mut open: Vec<(char, usize, usize)> = Vec::new();
    let mut escaped = false;

    for (line_idx, line) in text.lines().enumerate() {
        for (col_idx, c) in line.chars().enumerate() {
            let pos = (line_idx + 1, col_idx + 1);
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '*' | '_' | '$' => {
                    if open.last().is_some_and(|(o, ..)| *o == c) {
                        open.pop();
                    } else {
                        open.push((c, pos.0, pos.1));
                    }
                }
                '[' | '(' | '{' => open.push((c, pos.0, pos.1)),
                ']' | ')' | '}' => {
                    let expected = match c {
                        ']' => '[',
                        ')' => '(',
                        _ => '{',
                    };
                    if open.last().is_some_and(|(o, ..)| *o == expected) {
                        open.pop();
                    } else {
                        return vec![format!(
                            "{entry}:{}:{}: error: unexpected closing delimiter",
                            pos.0, pos.1
                        )];
                    }
                }
                _ => {}
            }
        }
    }

    open.into_iter()
        .map(|(c, line, col)| format!("{entry}:{line}:{col}: error: unclosed delimiter `{c}`"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_markup_accepts_balanced() {
        assert!(check_markup("main.typ", "= Hello\n\nThis is a test.").is_empty());
        assert!(check_markup("main.typ", "*bold* and _emph_ and $x^2$").is_empty());
        assert!(check_markup("main.typ", "#let f(x) = [#x]").is_empty());
        assert!(check_markup("main.typ", "literal \\* star").is_empty());
    }

    #[test]
    fn test_check_markup_reports_unterminated() {
        let errors = check_markup("main.typ", "= Title\n\n*never closed");
        assert_eq!(errors, vec!["main.typ:3:1: error: unclosed delimiter `*`"]);

        let errors = check_markup("main.typ", "#let x = (1, 2");
        assert_eq!(errors.len(), 1);

        let errors = check_markup("main.typ", "oops]");
        assert!(errors[0].contains("unexpected closing delimiter"));
    }
}
