//! End-to-end checkout flow scenarios at the library level: step
//! derivation, consent-gated SDK delivery, and mid-flow consent grants.

use atelier_core::{ConsentCategory, DeliveryDetails, Measurements};
use atelier_storefront::checkout::{CheckoutStep, OrderDraft};
use atelier_storefront::config::ProviderConfig;
use atelier_storefront::consent::{ConsentGate, ConsentPreferences, GateState, ScriptRegistry};
use atelier_storefront::payments::ProviderKind;

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        paypal_client_id: Some("client-abc".to_owned()),
        stripe_publishable_key: Some("pk_test_123".to_owned()),
        mollie_profile_id: None,
    }
}

#[test]
fn measurements_then_delivery_advances_steps() {
    let mut draft = OrderDraft::default();
    assert_eq!(draft.step().number(), 1);

    draft
        .submit_measurements(Measurements {
            height: 180,
            chest: 100,
            waist: 80,
            hips: 95,
        })
        .unwrap();
    assert_eq!(draft.step(), CheckoutStep::Delivery);
    assert_eq!(draft.step().number(), 2);

    draft
        .submit_delivery(DeliveryDetails {
            full_name: "A B".to_owned(),
            address: "X".to_owned(),
            city: "Y".to_owned(),
            postal_code: "12345".to_owned(),
            country: "DE".to_owned(),
            email: "a@b.com".to_owned(),
            phone: "123".to_owned(),
        })
        .unwrap();
    assert_eq!(draft.step(), CheckoutStep::Payment);
    assert_eq!(draft.step().number(), 3);
}

#[test]
fn blocked_targeting_withholds_every_sdk_url() {
    let gate = ConsentGate::new(ConsentPreferences::necessary_only());
    let config = provider_config();

    for provider in ProviderKind::ALL {
        assert_eq!(gate.decide(provider.consent_category()), GateState::Blocked);
        // The gate verdict is what keeps sdk_script_url from being used at
        // all; a blocked category must never emit a script URL downstream.
        if gate.require(provider.consent_category()).is_err() {
            continue;
        }
        panic!("provider {provider} must be blocked for a fresh visitor");
    }

    // Once granted, configured providers do resolve a script URL.
    let open_gate = ConsentGate::new(ConsentPreferences::all());
    assert!(open_gate.require(ConsentCategory::Targeting).is_ok());
    assert!(ProviderKind::PayPal.sdk_script_url(&config).is_some());
}

#[test]
fn mid_flow_grant_activates_scripts_exactly_once() {
    let config = provider_config();
    let old = ConsentPreferences::necessary_only();
    let new = ConsentPreferences::all();
    let mut registry = ScriptRegistry::default();

    // First grant event: every configured provider activates once.
    let mut first_pass = Vec::new();
    for provider in ProviderKind::ALL {
        let category = provider.consent_category();
        if !old.granted(category)
            && new.granted(category)
            && let Some(url) = provider.sdk_script_url(&config)
            && registry.activate(&url)
        {
            first_pass.push(url);
        }
    }
    assert_eq!(first_pass.len(), 2, "paypal and stripe are configured");

    // Re-entrant grant event with identical consent: nothing activates.
    let mut second_pass = Vec::new();
    for provider in ProviderKind::ALL {
        if let Some(url) = provider.sdk_script_url(&config)
            && registry.activate(&url)
        {
            second_pass.push(url);
        }
    }
    assert!(second_pass.is_empty(), "duplicate script tags must never be injected");
}
