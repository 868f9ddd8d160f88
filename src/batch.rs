//! Batch-level group bookkeeping: request normalization, per-group
//! diffing, and draw selection.
//!
//! This is the CPU half of the engine. It owns every [`GroupState`],
//! normalizes the polymorphic update shapes into one tagged request,
//! applies the diff pipeline per group, and resolves draw selections
//! (including the sticky one-shot `draw` flag) into a plain index list.
//! The GPU half lives in [`crate::renderer`].

use crate::group::{AfterHook, ApplyEffect, GroupSpec, GroupState, UpdateError};

/// Canonical form of the polymorphic update argument.
///
/// Callers may pass a full spec, a batch of specs (index = group id), a
/// flat coordinate array (positions shorthand), or a closure (after-hook
/// shorthand); all are normalized here before entering the pipeline.
pub enum UpdateRequest {
    /// Flat positions for group 0.
    Positions(Vec<f64>),
    /// After-hook for group 0.
    Hook(AfterHook),
    /// One spec for group 0.
    Single(GroupSpec),
    /// One optional spec per group id; `None` entries are untouched.
    Batch(Vec<Option<GroupSpec>>),
}

impl UpdateRequest {
    /// Closure shorthand: install a post-draw hook on group 0.
    pub fn hook(f: impl FnMut(&GroupState) + 'static) -> Self {
        Self::Hook(Box::new(f))
    }
}

impl From<GroupSpec> for UpdateRequest {
    fn from(spec: GroupSpec) -> Self {
        Self::Single(spec)
    }
}

impl From<Vec<GroupSpec>> for UpdateRequest {
    fn from(specs: Vec<GroupSpec>) -> Self {
        Self::Batch(specs.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<GroupSpec>>> for UpdateRequest {
    fn from(specs: Vec<Option<GroupSpec>>) -> Self {
        Self::Batch(specs)
    }
}

impl From<Vec<f64>> for UpdateRequest {
    fn from(positions: Vec<f64>) -> Self {
        Self::Positions(positions)
    }
}

impl From<&[f64]> for UpdateRequest {
    fn from(positions: &[f64]) -> Self {
        Self::Positions(positions.to_vec())
    }
}

/// Which groups a draw call targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DrawSelection {
    /// Every group passing the visibility predicate, honoring each
    /// group's sticky `draw` flag.
    #[default]
    All,
    /// Exactly one group by id.
    Only(usize),
    /// One-shot visibility override per group index, consumed by the call.
    Mask(Vec<bool>),
}

impl From<usize> for DrawSelection {
    fn from(index: usize) -> Self {
        Self::Only(index)
    }
}

impl From<Vec<bool>> for DrawSelection {
    fn from(mask: Vec<bool>) -> Self {
        Self::Mask(mask)
    }
}

/// CPU-side batch state: the group list and its update/selection logic.
#[derive(Default)]
pub struct BatchState {
    pub(crate) groups: Vec<GroupState>,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[GroupState] {
        &self.groups
    }

    /// Apply an update request.
    ///
    /// Groups are created the first time their index is referenced,
    /// starting from the construction defaults (opaque black, cap size 5,
    /// line width 1, opacity 1). Returns the combined effect so the
    /// caller knows whether a repack/re-upload is due. A color error
    /// aborts before any packing happens.
    pub fn update(&mut self, request: UpdateRequest) -> Result<ApplyEffect, UpdateError> {
        let batch = match request {
            UpdateRequest::Positions(positions) => {
                vec![Some(GroupSpec::new().positions(positions))]
            }
            UpdateRequest::Hook(hook) => vec![Some(GroupSpec::new().after(hook))],
            UpdateRequest::Single(spec) => vec![Some(spec)],
            UpdateRequest::Batch(specs) => specs,
        };

        let mut effect = ApplyEffect::default();
        for (i, spec) in batch.into_iter().enumerate() {
            let Some(mut spec) = spec else { continue };

            if i >= self.groups.len() {
                while self.groups.len() <= i {
                    self.groups.push(GroupState::new(self.groups.len()));
                }
                // First update of a fresh group flows the defaults through
                // the same pipeline as caller-supplied fields.
                spec = spec.or(GroupSpec::defaults());
                tracing::debug!("Created error-bar group {}", i);
            }

            effect.merge(self.groups[i].apply(spec)?);
        }

        Ok(effect)
    }

    /// Resolve a selection into the group indices to draw, consuming
    /// one-shot flags.
    ///
    /// A group participates when it has points and a positive opacity.
    /// With [`DrawSelection::All`], a group whose sticky `draw` flag was
    /// cleared is skipped once and the flag reset. A mask sets the flag
    /// for this call only.
    pub fn draw_list(&mut self, selection: &DrawSelection) -> Vec<usize> {
        match selection {
            DrawSelection::Only(index) => self
                .groups
                .get(*index)
                .filter(|g| g.visible())
                .map(|g| vec![g.id])
                .unwrap_or_default(),
            DrawSelection::All => self.select(|_, draw| draw),
            DrawSelection::Mask(mask) => {
                self.select(|id, _| mask.get(id).copied().unwrap_or(false))
            }
        }
    }

    fn select(&mut self, requested: impl Fn(usize, bool) -> bool) -> Vec<usize> {
        let mut list = Vec::new();
        for group in &mut self.groups {
            if !group.visible() {
                continue;
            }
            group.draw = requested(group.id, group.draw);
            if !group.draw {
                // Skipped for one pass only; the flag resets immediately.
                group.draw = true;
                continue;
            }
            list.push(group.id);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::pack::pack;

    fn positions(n: usize) -> Vec<f64> {
        (0..n).flat_map(|i| [i as f64, -(i as f64)]).collect()
    }

    #[test]
    fn test_flat_array_shorthand() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::from(vec![0.0, 0.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(state.groups()[0].count, 2);
    }

    #[test]
    fn test_closure_shorthand_sets_hook() {
        let mut state = BatchState::new();
        state.update(UpdateRequest::hook(|_| {})).unwrap();
        assert!(state.groups()[0].after.is_some());
    }

    #[test]
    fn test_batch_creates_groups_by_index() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::Batch(vec![
                Some(GroupSpec::new().positions(positions(2))),
                None,
                Some(GroupSpec::new().positions(positions(1))),
            ]))
            .unwrap();
        assert_eq!(state.groups().len(), 3);
        assert_eq!(state.groups()[1].count, 0);
        assert_eq!(state.groups()[2].count, 1);
    }

    #[test]
    fn test_two_group_packing() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::Batch(vec![
                Some(GroupSpec::new().positions(positions(2))),
                Some(GroupSpec::new().positions(positions(3))),
            ]))
            .unwrap();
        let packed = pack(&mut state.groups);
        assert_eq!(packed.position_hi.len(), 10);
        assert_eq!(state.groups()[1].offset, 2);
    }

    #[test]
    fn test_update_idempotence() {
        let run = || {
            let mut state = BatchState::new();
            state
                .update(UpdateRequest::Batch(vec![
                    Some(
                        GroupSpec::new()
                            .positions(positions(3))
                            .errors(vec![0.5; 12])
                            .color(Color::RED),
                    ),
                    Some(GroupSpec::new().positions(positions(2))),
                ]))
                .unwrap();
            pack(&mut state.groups)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_color_error_aborts_update() {
        let mut state = BatchState::new();
        let err = state.update(UpdateRequest::Single(
            GroupSpec::new()
                .positions(positions(3))
                .colors(vec![Color::RED, Color::BLUE]),
        ));
        assert!(err.is_err());
    }

    #[test]
    fn test_repack_signal_on_count_change() {
        let mut state = BatchState::new();
        let effect = state
            .update(UpdateRequest::from(positions(2)))
            .unwrap();
        assert!(effect.size_changed);

        // Same count again: content rewritten, offsets stable.
        let effect = state
            .update(UpdateRequest::from(positions(2)))
            .unwrap();
        assert!(!effect.size_changed);
        assert!(effect.data_changed);
    }

    #[test]
    fn test_draw_all_honors_visibility() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::Batch(vec![
                Some(GroupSpec::new().positions(positions(2))),
                Some(GroupSpec::new().positions(Vec::new())),
                Some(GroupSpec::new().positions(positions(1)).opacity(0.0)),
            ]))
            .unwrap();
        assert_eq!(state.draw_list(&DrawSelection::All), vec![0]);
    }

    #[test]
    fn test_mask_is_one_shot() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::Batch(vec![
                Some(GroupSpec::new().positions(positions(2))),
                Some(GroupSpec::new().positions(positions(2))),
            ]))
            .unwrap();

        // Mask suppresses group 1 for this call only.
        assert_eq!(state.draw_list(&DrawSelection::Mask(vec![true, false])), vec![0]);
        assert_eq!(state.draw_list(&DrawSelection::All), vec![0, 1]);
    }

    #[test]
    fn test_single_selection() {
        let mut state = BatchState::new();
        state
            .update(UpdateRequest::Batch(vec![
                Some(GroupSpec::new().positions(positions(2))),
                Some(GroupSpec::new().positions(positions(2))),
            ]))
            .unwrap();
        assert_eq!(state.draw_list(&DrawSelection::Only(1)), vec![1]);
        assert_eq!(state.draw_list(&DrawSelection::Only(7)), Vec::<usize>::new());
    }

    #[test]
    fn test_groups_never_destroyed() {
        let mut state = BatchState::new();
        state.update(UpdateRequest::from(positions(3))).unwrap();
        state.update(UpdateRequest::from(Vec::<f64>::new())).unwrap();
        assert_eq!(state.groups().len(), 1);
        assert_eq!(state.groups()[0].count, 0);
        assert!(state.draw_list(&DrawSelection::All).is_empty());
    }
}
