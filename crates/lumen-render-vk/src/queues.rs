// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use lumen_core::InitError;

/// Queue family indices for the two roles; equal when one family does both.
///
/// Fixed for the lifetime of the logical device created from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueAssignment {
    pub graphics: u32,
    pub present: u32,
}

impl QueueAssignment {
    pub fn is_combined(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct families, graphics first. One entry per queue to create.
    pub fn unique_families(&self) -> Vec<u32> {
        if self.is_combined() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// One scan in index order.
///
/// The first family that does both graphics and presentation wins outright.
/// Otherwise graphics and present go to the first family capable of each.
pub fn resolve(
    families: &[vk::QueueFlags],
    can_present: impl Fn(u32) -> bool,
) -> Result<QueueAssignment, InitError> {
    let mut graphics = None;
    let mut present = None;

    for (i, flags) in families.iter().enumerate() {
        let i = i as u32;
        let gfx = flags.contains(vk::QueueFlags::GRAPHICS);
        let pres = can_present(i);

        if gfx && pres {
            return Ok(QueueAssignment {
                graphics: i,
                present: i,
            });
        }
        if gfx && graphics.is_none() {
            graphics = Some(i);
        }
        if pres && present.is_none() {
            present = Some(i);
        }
    }

    match (graphics, present) {
        (None, _) => Err(InitError::NoGraphicsQueue),
        (_, None) => Err(InitError::NoPresentationQueue),
        (Some(graphics), Some(present)) => Ok(QueueAssignment { graphics, present }),
    }
}
