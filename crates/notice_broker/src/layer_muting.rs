//! `LayerMutingChanged` payload

use serde::{Deserialize, Serialize};

/// Layers muted and unmuted, in the order it happened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMutingChanged {
    muted_layers: Vec<String>,
    unmuted_layers: Vec<String>,
}

impl LayerMutingChanged {
    pub fn new(muted_layers: Vec<String>, unmuted_layers: Vec<String>) -> Self {
        Self {
            muted_layers,
            unmuted_layers,
        }
    }

    pub fn muted_layers(&self) -> &[String] {
        &self.muted_layers
    }

    pub fn unmuted_layers(&self) -> &[String] {
        &self.unmuted_layers
    }

    /// Fold a later notice into this one.
    ///
    /// A layer muted by `later` cancels a matching unmute accumulated before
    /// this call, and the other way around. Entries appended by this same
    /// call never cancel each other.
    pub fn merge(&mut self, later: LayerMutingChanged) {
        let mut muted_before = self.muted_layers.len();
        let mut unmuted_before = self.unmuted_layers.len();

        for layer in later.muted_layers {
            if cancel(&mut self.unmuted_layers, unmuted_before, &layer) {
                unmuted_before -= 1;
            } else {
                self.muted_layers.push(layer);
            }
        }

        for layer in later.unmuted_layers {
            if cancel(&mut self.muted_layers, muted_before, &layer) {
                muted_before -= 1;
            } else {
                self.unmuted_layers.push(layer);
            }
        }
    }
}

fn cancel(layers: &mut Vec<String>, searchable: usize, layer: &str) -> bool {
    match layers[..searchable].iter().position(|l| l == layer) {
        Some(index) => {
            layers.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn muting(muted: &[&str], unmuted: &[&str]) -> LayerMutingChanged {
        LayerMutingChanged::new(
            muted.iter().map(|s| s.to_string()).collect(),
            unmuted.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_mute_then_unmute_cancels() {
        let mut notice = muting(&["L"], &[]);
        notice.merge(muting(&[], &["L"]));
        assert!(notice.muted_layers().is_empty());
        assert!(notice.unmuted_layers().is_empty());
    }

    #[test]
    fn test_remute_after_cancel() {
        let mut notice = muting(&["L1"], &[]);
        notice.merge(muting(&["L2"], &[]));
        notice.merge(muting(&[], &["L2"]));
        notice.merge(muting(&["L3", "L2"], &[]));
        assert_eq!(notice, muting(&["L1", "L3", "L2"], &[]));
    }

    #[test]
    fn test_same_notice_entries_do_not_cancel() {
        let mut notice = muting(&[], &[]);
        notice.merge(muting(&["L"], &["L"]));
        assert_eq!(notice, muting(&["L"], &["L"]));
    }

    #[test]
    fn test_unmute_then_mute_cancels() {
        let mut notice = muting(&[], &["A", "B"]);
        notice.merge(muting(&["B"], &[]));
        assert_eq!(notice, muting(&[], &["A"]));
    }
}
