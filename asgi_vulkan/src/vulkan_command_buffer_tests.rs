use super::*;

#[test]
fn test_fresh_fence_has_nothing_in_flight() {
    let fence = SubmitFence::from_fence(vk::Fence::null());
    assert!(!fence.in_flight());
}

#[test]
fn test_only_accepted_submission_is_in_flight() {
    let mut fence = SubmitFence::from_fence(vk::Fence::null());
    // A rejected submit never reaches `submitted`
    assert!(!fence.in_flight());
    fence.submitted();
    assert!(fence.in_flight());
}
