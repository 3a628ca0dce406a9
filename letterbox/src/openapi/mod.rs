//! OpenAPI documentation for the HTTP API.
//!
//! [`ApiDoc`] covers the root routes (authentication, the signup redirect, webhooks) and nests
//! [`RestApiDoc`] under `/api`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Session cookie and trusted proxy header schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "letterbox_session",
                "Session token set by `/authentication/login` and `/authentication/register`.",
            ))),
        );
        components.security_schemes.insert(
            "X-Letterbox-User".to_string(),
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "x-letterbox-user",
                "Email of the user, set by a trusted SSO proxy. Only accepted when proxy header auth is enabled.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::users::get_current_user,
        api::handlers::users::list_users,
        api::handlers::monetization::get_overview,
        api::handlers::subscriptions::list_tiers,
        api::handlers::subscriptions::create_tier,
        api::handlers::subscriptions::update_tier,
        api::handlers::subscriptions::delete_tier,
        api::handlers::subscriptions::list_subscriptions,
        api::handlers::subscriptions::create_subscription,
        api::handlers::subscriptions::update_subscription,
        api::handlers::donations::list_donations,
        api::handlers::donations::create_donation,
        api::handlers::donations::update_donation,
        api::handlers::donations::delete_donation,
        api::handlers::donations::list_donation_tiers,
        api::handlers::donations::create_donation_tier,
        api::handlers::donations::update_donation_tier,
        api::handlers::donations::delete_donation_tier,
        api::handlers::donations::process_public_donation,
        api::handlers::donations::get_creator_tiers,
        api::handlers::sponsored_ads::list_campaigns,
        api::handlers::sponsored_ads::create_campaign,
        api::handlers::sponsored_ads::update_campaign,
        api::handlers::sponsored_ads::track_event,
        api::handlers::cross_promotions::list_promotions,
        api::handlers::cross_promotions::create_promotion,
        api::handlers::cross_promotions::update_promotion,
        api::handlers::cross_promotions::delete_promotion,
        api::handlers::cross_promotions::track_event,
        api::handlers::digital_products::list_products,
        api::handlers::digital_products::create_product,
        api::handlers::digital_products::update_product,
        api::handlers::digital_products::delete_product,
        api::handlers::digital_products::purchase_product,
        api::handlers::digital_products::download,
        api::handlers::affiliates::list_links,
        api::handlers::affiliates::create_link,
        api::handlers::affiliates::update_link,
        api::handlers::affiliates::delete_link,
        api::handlers::affiliates::list_referrals,
        api::handlers::affiliates::track_event,
        api::handlers::funds::get_funds,
        api::handlers::funds::request_withdrawal,
        api::handlers::funds::create_withdrawal_method,
        api::handlers::funds::delete_withdrawal_method,
        api::handlers::brand_funds::get_brand_funds,
        api::handlers::brand_funds::add_brand_funds,
        api::handlers::billing::get_billing,
        api::handlers::billing::update_plan,
        api::handlers::billing::add_payment_method,
    ),
    tags(
        (name = "users", description = "Profiles and balances"),
        (name = "monetization", description = "All revenue streams at a glance"),
        (name = "subscriptions", description = "Paid subscription tiers (90% to the creator)"),
        (name = "donations", description = "Donations and donation tiers (90% to the creator)"),
        (name = "sponsored-ads", description = "Brand campaigns paid per click (80% to the creator)"),
        (name = "cross-promotions", description = "Newsletter cross-promotions (80% to the creator)"),
        (name = "digital-products", description = "Products sold with signed download links (90% to the creator)"),
        (name = "affiliates", description = "Referral links and commissions (50% to the referrer)"),
        (name = "funds", description = "Creator balances and withdrawals"),
        (name = "brand-funds", description = "Brand deposits for advertising"),
        (name = "billing", description = "The operator's platform plan"),
    )
)]
pub struct RestApiDoc;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Letterbox API",
        description = "Monetization backend for newsletter creators and the brands that sponsor them. Money is sent and returned as decimal strings."
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::affiliates::signup_redirect,
        api::handlers::webhooks::payment_webhook,
    ),
    nest(
        (path = "/api", api = RestApiDoc)
    ),
    tags(
        (name = "authentication", description = "Native registration and sessions"),
        (name = "webhooks", description = "Payment provider events"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_nests_rest_routes_and_declares_security() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["paths"]["/api/monetization/subscription-tiers"].is_object());
        assert!(json["paths"]["/api/brand/funds"]["post"].is_object());
        assert!(json["paths"]["/authentication/login"].is_object());
        assert!(json["paths"]["/webhooks/payments"].is_object());

        let schemes = &json["components"]["securitySchemes"];
        assert_eq!(schemes["CookieAuth"]["in"], "cookie");
        assert_eq!(schemes["X-Letterbox-User"]["name"], "x-letterbox-user");
    }
}
