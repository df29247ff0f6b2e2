pub mod admin;
pub mod auth;
pub mod booking;
pub mod chatbot;
pub mod reservations;
pub mod rooms;
pub mod sessions;

use actix_web::web;

/// Registers every route of the API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sessions", web::post().to(sessions::create_session))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/logout", web::post().to(auth::logout))
                .route("/2fa/verify", web::post().to(auth::verify_two_factor))
                .route("/2fa/enable", web::post().to(auth::enable_two_factor))
                .route("/2fa/disable", web::post().to(auth::disable_two_factor))
                .route("/profile", web::get().to(auth::get_profile))
                .route("/profile", web::put().to(auth::update_profile))
                .route("/preferences", web::put().to(auth::update_preferences))
                .route("/notifications/toggle", web::post().to(auth::toggle_notifications))
                .route("/password", web::post().to(auth::change_password))
                .route("/password-reset", web::post().to(auth::request_password_reset))
                .route(
                    "/password-reset/confirm",
                    web::post().to(auth::confirm_password_reset),
                ),
        )
        .service(
            web::scope("/room-types")
                .route("", web::get().to(rooms::list_room_types))
                .route("/{id}", web::get().to(rooms::get_room_type)),
        )
        .route("/services", web::get().to(rooms::list_services))
        .route("/plans", web::get().to(rooms::list_plans))
        .route("/promotions", web::get().to(rooms::list_promotions))
        .service(
            web::scope("/booking")
                .route("", web::get().to(booking::get_draft))
                .route("", web::delete().to(booking::discard))
                .route("/guests", web::post().to(booking::set_guests))
                .route("/dates", web::post().to(booking::set_dates))
                .route("/room-options", web::get().to(booking::room_options))
                .route("/rooms", web::post().to(booking::set_rooms))
                .route("/extras", web::post().to(booking::set_extras))
                .route("/checkout", web::post().to(booking::checkout)),
        )
        .service(
            web::scope("/reservations")
                .route("", web::get().to(reservations::list_mine))
                .route("/confirm", web::post().to(reservations::confirm))
                .route("/{id}", web::get().to(reservations::get_mine))
                .route("/{id}/cancel", web::post().to(reservations::cancel)),
        )
        .route("/chatbot", web::post().to(chatbot::chat))
        .service(web::scope("/admin").configure(configure_admin));
}

fn configure_admin(cfg: &mut web::ServiceConfig) {
    use admin::{catalog, dashboard, emails, front_desk, roles, users};

    cfg.route("/dashboard", web::get().to(dashboard::get_dashboard))
        .service(
            web::scope("/room-types")
                .route("", web::get().to(catalog::list_room_types))
                .route("", web::post().to(catalog::create_room_type))
                .route("/{id}", web::put().to(catalog::update_room_type))
                .route("/{id}", web::delete().to(catalog::delete_room_type)),
        )
        .service(
            web::scope("/rooms")
                .route("", web::get().to(catalog::list_rooms))
                .route("", web::post().to(catalog::create_room))
                .route("/{id}", web::put().to(catalog::update_room))
                .route("/{id}", web::delete().to(catalog::delete_room)),
        )
        .service(
            web::scope("/plans")
                .route("", web::get().to(catalog::list_plans))
                .route("", web::post().to(catalog::create_plan))
                .route("/{id}", web::put().to(catalog::update_plan))
                .route("/{id}", web::delete().to(catalog::delete_plan)),
        )
        .service(
            web::scope("/promotions")
                .route("", web::get().to(catalog::list_promotions))
                .route("", web::post().to(catalog::create_promotion))
                .route("/{id}", web::put().to(catalog::update_promotion))
                .route("/{id}", web::delete().to(catalog::delete_promotion)),
        )
        .service(
            web::scope("/services")
                .route("", web::get().to(catalog::list_services))
                .route("", web::post().to(catalog::create_service))
                .route("/{id}", web::put().to(catalog::update_service))
                .route("/{id}", web::delete().to(catalog::delete_service))
                .route("/{id}/toggle", web::post().to(catalog::toggle_service)),
        )
        .service(
            web::scope("/reservations")
                .route("", web::get().to(front_desk::list_reservations))
                .route("/bulk", web::post().to(front_desk::bulk_action))
                .route("/{id}", web::delete().to(front_desk::delete_reservation))
                .route("/{id}/check-in", web::post().to(front_desk::check_in))
                .route("/{id}/check-out", web::post().to(front_desk::check_out)),
        )
        .route("/guests", web::get().to(front_desk::list_guests))
        .route("/active-guests", web::get().to(front_desk::list_active_guests))
        .service(
            web::scope("/users")
                .route("", web::get().to(users::list_users))
                .route("/{id}", web::get().to(users::get_user))
                .route("/{id}/block", web::post().to(users::block_user))
                .route("/{id}/unblock", web::post().to(users::unblock_user))
                .route("/{id}/roles", web::post().to(roles::assign_role))
                .route("/{id}/roles/{role_id}", web::delete().to(roles::revoke_role)),
        )
        .service(
            web::scope("/roles")
                .route("", web::get().to(roles::list_roles))
                .route("", web::post().to(roles::create_role))
                .route("/{id}/permissions", web::put().to(roles::set_role_permissions)),
        )
        .route("/permissions", web::get().to(roles::list_permissions))
        .route("/role-preview", web::post().to(roles::start_preview))
        .route("/role-preview", web::delete().to(roles::stop_preview))
        .route("/emails", web::post().to(emails::send_bulk_email))
        .route("/emails", web::get().to(emails::list_outbox));
}
