//! Webhook signature tests
//!
//! A delivery is accepted exactly when it carries a `v1` signature computed
//! with the shared secret over `"{t}.{body}"` and `t` is within tolerance.

use greenleaf_backend::error::AppError;
use greenleaf_backend::services::payment_events::{
    compute_signature, decrement_stock, verify_stripe_signature,
};
use proptest::prelude::*;
use tokio_test::{assert_err, assert_ok};

const SECRET: &str = "whsec_greenleaf_test";
const TOLERANCE: i64 = 300;
const NOW: i64 = 1_718_000_000;

fn header(timestamp: i64, payload: &[u8], secret: &str) -> String {
    let signature = compute_signature(secret, &timestamp.to_string(), payload).unwrap();
    format!("t={},v1={}", timestamp, signature)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;

    #[test]
    fn test_valid_signature_accepted() {
        let h = header(NOW, BODY, SECRET);
        assert_ok!(verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW));
    }

    #[test]
    fn test_header_with_extra_schemes_accepted() {
        let h = format!("{},v0=deadbeef", header(NOW, BODY, SECRET));
        assert!(verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let h = header(NOW, BODY, "whsec_other");
        assert!(matches!(
            verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW),
            Err(AppError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let h = header(NOW, BODY, SECRET);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_2"}}}"#;
        assert_err!(verify_stripe_signature(&h, tampered, SECRET, TOLERANCE, NOW));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let h = header(NOW - TOLERANCE - 1, BODY, SECRET);
        assert!(verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW).is_err());

        let edge = header(NOW - TOLERANCE, BODY, SECRET);
        assert!(verify_stripe_signature(&edge, BODY, SECRET, TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for timestamp in [i64::MIN, i64::MIN + 1, i64::MAX] {
            let h = header(timestamp, BODY, SECRET);
            assert!(matches!(
                verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW),
                Err(AppError::InvalidSignature(_))
            ));
        }

        let h = format!("t={},v1={}", i64::MIN, "ab".repeat(32));
        assert_err!(verify_stripe_signature(&h, BODY, SECRET, TOLERANCE, NOW));
    }

    #[test]
    fn test_rejected_signature_maps_to_bad_request() {
        let err = verify_stripe_signature("t=1", BODY, SECRET, TOLERANCE, NOW).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_oversell_floors_inventory() {
        assert_eq!(decrement_stock(4, 6), (0, 2));
        assert_eq!(decrement_stock(0, 1), (0, 1));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Correctly signed payloads within tolerance are accepted
        #[test]
        fn prop_signed_payload_accepted(
            body in prop::collection::vec(any::<u8>(), 0..256),
            skew in -TOLERANCE..=TOLERANCE,
        ) {
            let h = header(NOW + skew, &body, SECRET);
            prop_assert!(verify_stripe_signature(&h, &body, SECRET, TOLERANCE, NOW).is_ok());
        }

        /// Flipping any byte of the body invalidates the signature
        #[test]
        fn prop_modified_payload_rejected(
            body in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let h = header(NOW, &body, SECRET);
            let mut tampered = body.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= flip;
            prop_assert!(verify_stripe_signature(&h, &tampered, SECRET, TOLERANCE, NOW).is_err());
        }

        /// Stock after fulfilment is never negative and accounts for every unit
        #[test]
        fn prop_decrement_accounts_for_units(on_hand in 0i32..1000, ordered in 1i32..1000) {
            let (remaining, shortfall) = decrement_stock(on_hand, ordered);
            prop_assert!(remaining >= 0);
            prop_assert_eq!(on_hand - ordered, remaining - shortfall);
        }
    }
}
