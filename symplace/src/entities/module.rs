use anyhow::{ensure, Result};
use slotmap::new_key_type;

new_key_type! {
    /// Key to a [`Module`] in the tree's module registry.
    pub struct ModuleKey;
}

/// Rectangular circuit module with a mutable lower-left position.
///
/// Width and height are swapped when the module is rotated; the area is
/// rotation-invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    width: i64,
    height: i64,
    pub x: i64,
    pub y: i64,
    rotated: bool,
}

impl Module {
    pub fn try_new(name: impl Into<String>, width: i64, height: i64) -> Result<Self> {
        let name = name.into();
        ensure!(
            width > 0 && height > 0,
            "module '{name}' must have positive dimensions, got {width}x{height}"
        );
        Ok(Module {
            name,
            width,
            height,
            x: 0,
            y: 0,
            rotated: false,
        })
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn rotated(&self) -> bool {
        self.rotated
    }

    pub fn area(&self) -> i64 {
        self.width * self.height
    }

    /// Swaps width and height and toggles the rotation flag.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.rotated = !self.rotated;
    }

    pub fn set_position(&mut self, x: i64, y: i64) {
        self.x = x;
        self.y = y;
    }

    pub fn x_max(&self) -> i64 {
        self.x + self.width
    }

    pub fn y_max(&self) -> i64 {
        self.y + self.height
    }
}
