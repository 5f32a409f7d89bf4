use folio_ngin::capability::{DeviceClass, UnsupportedReason, detect};

use crate::common::test_utils::{
    DESKTOP_CHROME, FakeProbe, IE11, IPAD, MAC_SAFARI, MODERN_ANDROID, MODERN_IPHONE, OLD_ANDROID,
    OLD_IPHONE, ProbeMode,
};

mod common;

#[test]
fn should_classify_user_agents() {
    // (agent, mobile, tablet, low end, safari-like, legacy)
    let table = [
        (DESKTOP_CHROME, false, false, false, false, false),
        (MAC_SAFARI, false, false, false, true, false),
        (MODERN_IPHONE, true, false, false, true, false),
        (OLD_IPHONE, true, false, true, true, false),
        (IPAD, true, true, false, true, false),
        (MODERN_ANDROID, true, false, false, false, false),
        (OLD_ANDROID, true, false, true, false, false),
        (IE11, false, false, false, false, true),
    ];
    for (agent, mobile, tablet, low_end, safari, legacy) in table {
        let class = DeviceClass::from_user_agent(agent);
        assert_eq!(class.is_mobile, mobile, "{}", agent);
        assert_eq!(class.is_tablet, tablet, "{}", agent);
        assert_eq!(class.is_low_end_device, low_end, "{}", agent);
        assert_eq!(class.is_safari_like, safari, "{}", agent);
        assert_eq!(class.is_legacy_engine, legacy, "{}", agent);
    }
}

#[test]
fn should_detect_a_healthy_desktop_and_release_the_probe() {
    let probe = FakeProbe::desktop();
    let caps = detect(&probe);

    assert!(caps.supported());
    assert_eq!(caps.reason(), None);
    assert_eq!(caps.renderer_info(), Some("FakeGPU"));
    assert!(!caps.is_mobile());
    assert!(!caps.prefers_reduced_motion());
    assert_eq!(probe.created(), 1);
    assert_eq!(probe.released(), 1);
}

#[test]
fn should_report_missing_context() {
    let probe = FakeProbe::desktop().with_mode(ProbeMode::NoContext);
    let caps = detect(&probe);

    assert!(!caps.supported());
    assert_eq!(caps.reason(), Some(UnsupportedReason::ContextCreationFailed));
    assert_eq!(caps.renderer_info(), None);
    assert_eq!(probe.released(), 0);
}

#[test]
fn should_report_failed_draw_test_and_still_release() {
    let probe = FakeProbe::desktop().with_mode(ProbeMode::DrawFails);
    let caps = detect(&probe);

    assert!(!caps.supported());
    assert_eq!(caps.reason(), Some(UnsupportedReason::DrawTestFailed));
    assert_eq!(probe.released(), 1);
}

#[test]
fn should_not_panic_when_the_probe_panics() {
    let probe = FakeProbe::desktop().with_mode(ProbeMode::PanicsOnDraw);
    let caps = detect(&probe);

    assert!(!caps.supported());
    assert_eq!(caps.reason(), Some(UnsupportedReason::GeneralError));
    assert_eq!(probe.created(), 1);
    assert_eq!(probe.released(), 1);

    let probe = FakeProbe::desktop().with_mode(ProbeMode::PanicsOnUserAgent);
    let caps = detect(&probe);

    assert!(!caps.supported());
    assert_eq!(caps.reason(), Some(UnsupportedReason::GeneralError));
    assert_eq!(probe.created(), 0);
}

#[test]
fn should_rule_out_low_end_and_legacy_hosts() {
    for (agent, reason) in [
        (OLD_IPHONE, UnsupportedReason::LowEndDevice),
        (OLD_ANDROID, UnsupportedReason::LowEndDevice),
        (IE11, UnsupportedReason::LegacyEngine),
    ] {
        let probe = FakeProbe::new(agent);
        let caps = detect(&probe);

        assert!(!caps.supported(), "{}", agent);
        assert_eq!(caps.reason(), Some(reason), "{}", agent);
        assert_eq!(probe.released(), 1, "{}", agent);
    }
}

#[test]
fn should_carry_device_traits_and_motion_preference() {
    let probe = FakeProbe::new(MODERN_IPHONE).with_reduced_motion();
    let caps = detect(&probe);

    assert!(caps.supported());
    assert!(caps.is_mobile());
    assert!(caps.is_safari_like());
    assert!(!caps.is_tablet());
    assert!(caps.prefers_reduced_motion());
}

#[test]
fn should_expose_stable_reason_codes() {
    assert_eq!(UnsupportedReason::ContextCreationFailed.code(), "context_creation_failed");
    assert_eq!(UnsupportedReason::DrawTestFailed.to_string(), "draw_test_failed");
    assert_eq!(UnsupportedReason::LowEndDevice.code(), "low_end_device");
}
