//! Forgery class labels.
//!
//! The index order is part of the response contract: every `classId` a
//! client has ever received refers to this table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of classes the classifier emits logits for.
pub const NUM_CLASSES: usize = 7;

/// Document forgery category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgeryClass {
    /// Authentic document.
    Positive,
    /// Region copied and pasted within the same document.
    CopyMove,
    /// Two faces blended into one portrait.
    FaceMorph,
    /// Portrait swapped for another face.
    FaceReplace,
    /// Several manipulations at once.
    Combined,
    /// Text region inpainted and rewritten.
    InpaintRewrite,
    /// Region cropped from another document.
    CropReplace,
}

impl ForgeryClass {
    /// All classes in wire order.
    pub const ALL: [ForgeryClass; NUM_CLASSES] = [
        ForgeryClass::Positive,
        ForgeryClass::CopyMove,
        ForgeryClass::FaceMorph,
        ForgeryClass::FaceReplace,
        ForgeryClass::Combined,
        ForgeryClass::InpaintRewrite,
        ForgeryClass::CropReplace,
    ];

    /// Look up a class by its index.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(CoreError::UnknownClass {
                index,
                num_classes: NUM_CLASSES,
            })
    }

    /// Index of this class in the logits row.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Label reported to clients.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ForgeryClass::Positive => "positive",
            ForgeryClass::CopyMove => "copy_move",
            ForgeryClass::FaceMorph => "face_morph",
            ForgeryClass::FaceReplace => "face_replace",
            ForgeryClass::Combined => "combined",
            ForgeryClass::InpaintRewrite => "inpaint_rewrite",
            ForgeryClass::CropReplace => "crop_replace",
        }
    }

    /// Whether the class denotes a manipulated document.
    #[must_use]
    pub const fn is_forgery(self) -> bool {
        !matches!(self, ForgeryClass::Positive)
    }
}

impl fmt::Display for ForgeryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
