//! World-transform component.

use crate::math::Mat4;

/// An entity's world matrix. Assigning a new value does not by itself
/// touch the scene grid — callers update a `Transform` then broadcast
/// [`super::events::ModelTransform`] so [`super::events::SceneGridSystem`]
/// can react.
#[derive(Clone, Copy, Debug)]
pub struct Transform(pub Mat4);

impl Default for Transform {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}
