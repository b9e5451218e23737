use crate::animation::{AnimationState, Param};

use super::types::{InputEvent, Key};

/// Adds `step` to parameter `param` on every press of `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBinding {
    pub key: Key,
    pub param: String,
    pub step: Param,
}

impl KeyBinding {
    pub fn new(key: Key, param: impl Into<String>, step: Param) -> Self {
        Self {
            key,
            param: param.into(),
            step,
        }
    }
}

/// Maps key presses onto named animation parameters.
///
/// Auto-repeat presses apply the step again, so holding a key keeps adjusting
/// the value. Releases are ignored.
#[derive(Debug, Clone, Default)]
pub struct InputBridge {
    bindings: Vec<KeyBinding>,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, binding: KeyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Binds `increase` and `decrease` to opposite steps on the same scalar.
    pub fn bind_scalar_pair(self, increase: Key, decrease: Key, param: &str, step: f32) -> Self {
        self.bind(KeyBinding::new(increase, param, Param::Scalar(step)))
            .bind(KeyBinding::new(decrease, param, Param::Scalar(-step)))
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn on_key_event(&self, event: &InputEvent, state: &mut AnimationState) {
        let InputEvent::KeyDown { key, .. } = *event else {
            return;
        };

        for binding in self.bindings.iter().filter(|b| b.key == key) {
            let next = match state.params.get(&binding.param) {
                None => Some(binding.step),
                Some(current) => current.checked_add(binding.step),
            };
            match next {
                Some(value) => {
                    log::trace!("{key} sets `{}` to {value}", binding.param);
                    state.set_param(binding.param.clone(), value);
                }
                None => log::warn!(
                    "{key} binding skipped: `{}` holds a {} but the step is a {}",
                    binding.param,
                    state.params.get(&binding.param).map_or("?", Param::kind_name),
                    binding.step.kind_name()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn zoom_bridge() -> InputBridge {
        InputBridge::new().bind_scalar_pair(Key::W, Key::S, "zoom", 0.1)
    }

    fn down(key: Key, repeat: bool) -> InputEvent {
        InputEvent::KeyDown { key, repeat }
    }

    #[test]
    fn key_down_creates_then_accumulates() {
        let bridge = zoom_bridge();
        let mut state = AnimationState::new();

        bridge.on_key_event(&down(Key::W, false), &mut state);
        assert_eq!(state.param("zoom"), Some(Param::Scalar(0.1)));

        bridge.on_key_event(&down(Key::S, false), &mut state);
        bridge.on_key_event(&down(Key::S, false), &mut state);
        let zoom = state.scalar("zoom", f32::NAN);
        assert!((zoom + 0.1).abs() < 1e-6, "{zoom}");
    }

    #[test]
    fn repeats_apply_the_step_again() {
        let bridge = zoom_bridge();
        let mut state = AnimationState::new();

        bridge.on_key_event(&down(Key::W, false), &mut state);
        bridge.on_key_event(&down(Key::W, true), &mut state);
        bridge.on_key_event(&down(Key::W, true), &mut state);
        let zoom = state.scalar("zoom", 0.0);
        assert!((zoom - 0.3).abs() < 1e-6, "{zoom}");
    }

    #[test]
    fn key_up_and_unbound_keys_change_nothing() {
        let bridge = zoom_bridge();
        let mut state = AnimationState::new();

        bridge.on_key_event(&InputEvent::KeyUp { key: Key::W }, &mut state);
        bridge.on_key_event(&down(Key::Q, false), &mut state);
        assert!(state.params.is_empty());
    }

    #[test]
    fn kind_mismatch_is_skipped() {
        let bridge = zoom_bridge();
        let mut state = AnimationState::new().with_param("zoom", Param::Vec3(Vec3::ONE));

        bridge.on_key_event(&down(Key::W, false), &mut state);
        assert_eq!(state.param("zoom"), Some(Param::Vec3(Vec3::ONE)));
    }
}
