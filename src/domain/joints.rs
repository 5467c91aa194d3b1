// ============================================================
// Layer 3 - Skeleton Joint Layout
// ============================================================
// The sensor reports 25 joints per frame, always in the order
// listed in JOINT_NAMES. Each joint contributes an (x, y) pair,
// so one raw frame has 50 numbers.
//
// A JointSelection is the subset of joints the classifier is
// trained on, resolved once from names to column indices.
// Its feature dimension is 2 * number of selected joints.

use crate::domain::error::TrainError;

/// Kinect v2 joint names in sensor order
pub const JOINT_NAMES: [&str; 25] = [
    "SPINEBASE",
    "SPINEMID",
    "NECK",
    "HEAD",
    "SHOULDERLEFT",
    "ELBOWLEFT",
    "WRISTLEFT",
    "HANDLEFT",
    "SHOULDERRIGHT",
    "ELBOWRIGHT",
    "WRISTRIGHT",
    "HANDRIGHT",
    "HIPLEFT",
    "KNEELEFT",
    "ANKLELEFT",
    "FOOTLEFT",
    "HIPRIGHT",
    "KNEERIGHT",
    "ANKLERIGHT",
    "FOOTRIGHT",
    "SPINESHOULDER",
    "HANDTIPLEFT",
    "THUMBLEFT",
    "HANDTIPRIGHT",
    "THUMBRIGHT",
];

/// Numbers per raw frame (x, y for every joint)
pub const RAW_FRAME_WIDTH: usize = JOINT_NAMES.len() * 2;

/// The joints used as model input, in the order they were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointSelection {
    indices: Vec<usize>,
}

impl JointSelection {
    /// Resolve joint names (case-insensitive) to sensor indices.
    /// Fails on an empty list, an unknown name or a duplicate.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Self, TrainError> {
        if names.is_empty() {
            return Err(TrainError::config("at least one joint must be selected"));
        }

        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let upper = name.as_ref().trim().to_uppercase();
            let idx = JOINT_NAMES
                .iter()
                .position(|j| *j == upper)
                .ok_or_else(|| TrainError::UnknownJoint(name.as_ref().to_string()))?;
            if indices.contains(&idx) {
                return Err(TrainError::config(format!("joint '{upper}' selected twice")));
            }
            indices.push(idx);
        }
        Ok(Self { indices })
    }

    /// Sensor indices of the selected joints
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Values per frame after selection: (x, y) per joint
    pub fn feature_dim(&self) -> usize {
        self.indices.len() * 2
    }

    /// Pick the selected (x, y) pairs out of one raw 50-value frame.
    pub fn project(&self, raw_frame: &[f32], out: &mut Vec<f32>) {
        for &j in &self.indices {
            out.push(raw_frame[2 * j]);
            out.push(raw_frame[2 * j + 1]);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_hands_and_elbows() {
        let sel = JointSelection::resolve(&["HANDLEFT", "HANDRIGHT", "ELBOWLEFT", "ELBOWRIGHT"])
            .unwrap();
        assert_eq!(sel.indices(), &[7, 11, 5, 9]);
        assert_eq!(sel.feature_dim(), 8);
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let sel = JointSelection::resolve(&["handLeft"]).unwrap();
        assert_eq!(sel.indices(), &[7]);
    }

    #[test]
    fn test_unknown_joint_is_rejected() {
        let err = JointSelection::resolve(&["TAIL"]).unwrap_err();
        assert!(matches!(err, TrainError::UnknownJoint(name) if name == "TAIL"));
    }

    #[test]
    fn test_duplicate_and_empty_selection_rejected() {
        assert!(JointSelection::resolve(&["HEAD", "head"]).is_err());
        let none: [&str; 0] = [];
        assert!(JointSelection::resolve(&none).is_err());
    }

    #[test]
    fn test_project_picks_xy_pairs() {
        let raw: Vec<f32> = (0..RAW_FRAME_WIDTH).map(|v| v as f32).collect();
        let sel = JointSelection::resolve(&["NECK", "SPINEBASE"]).unwrap();
        let mut out = Vec::new();
        sel.project(&raw, &mut out);
        // NECK is joint 2 → columns 4,5; SPINEBASE is joint 0 → columns 0,1
        assert_eq!(out, vec![4.0, 5.0, 0.0, 1.0]);
    }
}
