use chrono::Local;
use colored::*;

use crate::types::{ClassificationResult, Identity, SpectralFrame};

/// Consumer of per-frame results (plots, panels, status lines).
pub trait ResultSink {
    /// `history` is oldest first and already contains `frame`.
    fn present(&mut self, result: &ClassificationResult, frame: &SpectralFrame, history: &[SpectralFrame]);

    /// Releases any display resources. Called once on shutdown.
    fn close(&mut self) {}
}

/// Text rendering of results on stdout.
pub struct ConsoleDisplay {
    show_values: bool,
    last_identity: Option<Identity>,
}

impl ConsoleDisplay {
    pub fn new(show_values: bool) -> Self {
        Self {
            show_values,
            last_identity: None,
        }
    }

    /// Status line for a result, without colour. `None` when nothing should be printed.
    pub fn status_line(&self, result: &ClassificationResult, with_hint: bool) -> Option<String> {
        match &result.identity {
            Identity::Unknown if self.last_identity.as_ref() == Some(&Identity::Unknown) => None,
            Identity::Unknown => {
                let mut line = format!("New object detected! | Distance: {:.2}", result.distance);
                if with_hint {
                    line.push_str("\nPress 'l' to label this new object.");
                }
                Some(line)
            }
            Identity::Known(label) => Some(format!(
                "Identified Object: {} | Distance: {:.2}",
                label, result.distance
            )),
        }
    }
}

impl ResultSink for ConsoleDisplay {
    fn present(&mut self, result: &ClassificationResult, frame: &SpectralFrame, history: &[SpectralFrame]) {
        let stamp = Local::now().format("%H:%M:%S");
        if let Some(line) = self.status_line(result, true) {
            let line = match result.identity {
                Identity::Unknown => line.yellow(),
                Identity::Known(_) => line.green(),
            };
            println!("[{}] {}", stamp, line);
        }

        if self.show_values {
            println!("{:<8} | {:>10} | {:>10}", "nm", "value", "reference");
            for (i, (nm, value)) in frame.channels().enumerate() {
                let reference = result
                    .reference
                    .map(|r| format!("{:.2}", r.values()[i]))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<8} | {:>10.2} | {:>10}", nm, value, reference);
            }
            // Fade order: oldest first, same as the plot.
            let fades: Vec<String> = (1..=history.len())
                .map(|i| format!("{:.2}", i as f64 / history.len() as f64))
                .collect();
            println!("history: {} frame(s), alpha [{}]", history.len(), fades.join(", "));
        }

        self.last_identity = Some(result.identity.clone());
    }

    fn close(&mut self) {
        println!("{}", "Display closed.".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CHANNELS;

    #[test]
    fn test_new_object_announced_once() {
        let mut display = ConsoleDisplay::new(false);
        let frame = SpectralFrame::new([1.0; CHANNELS]);
        let unknown = ClassificationResult::unknown(120.0);

        assert!(display.status_line(&unknown, false).unwrap().contains("New object"));
        display.present(&unknown, &frame, &[frame]);
        assert_eq!(display.status_line(&unknown, false), None);
    }

    #[test]
    fn test_known_result_always_reported() {
        let mut display = ConsoleDisplay::new(false);
        let frame = SpectralFrame::new([1.0; CHANNELS]);
        let known = ClassificationResult {
            identity: Identity::Known("Lemon".into()),
            distance: 3.14159,
            reference: Some(frame),
        };
        display.present(&known, &frame, &[frame]);
        assert_eq!(
            display.status_line(&known, false).as_deref(),
            Some("Identified Object: Lemon | Distance: 3.14")
        );
    }
}
