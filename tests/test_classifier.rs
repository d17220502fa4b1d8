// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use setblocksize_rs::status::{
    DriverStatus, HostStatus, OutcomeCategory, TargetStatus, classify,
};

use crate::support::fixed_sense;

#[test]
fn all_good_triple_is_clean_regardless_of_sense() {
    // Rule 1 wins even over a sense buffer claiming a medium error.
    let noise = fixed_sense(0x03, 0x31, 0x00);
    for sense in [&[0u8; 16][..], &noise[..], &[0xFF; 16][..]] {
        assert_eq!(
            classify(
                TargetStatus::Good,
                HostStatus::Ok,
                DriverStatus(DriverStatus::OK),
                sense
            ),
            OutcomeCategory::Clean
        );
    }
}

#[test]
fn recovered_sense_downgrades_any_failing_tier() {
    let sense = fixed_sense(0x01, 0x17, 0x01);

    assert_eq!(
        classify(
            TargetStatus::CheckCondition,
            HostStatus::Ok,
            DriverStatus(DriverStatus::SENSE),
            &sense
        ),
        OutcomeCategory::RecoveredError
    );
    assert_eq!(
        classify(
            TargetStatus::Good,
            HostStatus::SoftError,
            DriverStatus(DriverStatus::OK),
            &sense
        ),
        OutcomeCategory::RecoveredError
    );
}

#[test]
fn check_condition_without_recovered_sense_is_fatal() {
    let sense = fixed_sense(0x03, 0x31, 0x00); // medium error
    assert_eq!(
        classify(
            TargetStatus::CheckCondition,
            HostStatus::Ok,
            DriverStatus(DriverStatus::SENSE),
            &sense
        ),
        OutcomeCategory::FatalError
    );
}

#[test]
fn failing_tier_without_any_sense_is_fatal() {
    assert_eq!(
        classify(
            TargetStatus::Good,
            HostStatus::TimeOut,
            DriverStatus(DriverStatus::OK),
            &[0u8; 16]
        ),
        OutcomeCategory::FatalError
    );
    assert_eq!(
        classify(
            TargetStatus::Busy,
            HostStatus::Ok,
            DriverStatus(DriverStatus::OK),
            &[]
        ),
        OutcomeCategory::FatalError
    );
}

#[test]
fn classification_is_total_over_a_status_sweep() {
    // Every combination lands in exactly one category; no panics, no
    // fourth outcome.
    let senses: [&[u8]; 4] = [
        &[],
        &[0u8; 16],
        &fixed_sense(0x01, 0x17, 0x01),
        &fixed_sense(0x05, 0x24, 0x00),
    ];
    for target in 0u8..=0x1F {
        for host in [0u16, 1, 3, 7, 0x0B, 0xFF] {
            for driver in [0u16, 1, 6, 8, 0x28, 0xF8] {
                for sense in senses {
                    let category = classify(
                        TargetStatus::from(target),
                        HostStatus::from(host),
                        DriverStatus(driver),
                        sense,
                    );
                    assert!(matches!(
                        category,
                        OutcomeCategory::Clean
                            | OutcomeCategory::RecoveredError
                            | OutcomeCategory::FatalError
                    ));
                }
            }
        }
    }
}

#[test]
fn driver_status_splits_code_and_suggestion() {
    let ds = DriverStatus(0x28); // SUGGEST_ABORT | DRIVER_SENSE
    assert_eq!(ds.driver_code(), DriverStatus::SENSE);
    assert_eq!(ds.suggestion(), 0x20);
    assert!(ds.carries_sense());
    assert!(!ds.is_ok());
    // A suggestion alone still spoils the all-zero good sentinel.
    assert!(!DriverStatus(0x20).is_ok());
    assert!(DriverStatus(0).is_ok());
}
