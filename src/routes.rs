use crate::{
    api::{employee, ffp, salary, vacation},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Limiter allowing `requests_per_min` requests per client IP, refilled evenly.
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .map(|cfg| Governor::new(&cfg))
}

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by all workers.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let limiter = |per_min: u32, name: &str| {
            build_limiter(per_min)
                .map(Arc::new)
                .ok_or_else(|| anyhow::anyhow!("invalid rate limit for {name}: {per_min}"))
        };
        Ok(Self {
            login: limiter(config.rate_login_per_min, "RATE_LOGIN_PER_MIN")?,
            refresh: limiter(config.rate_refresh_per_min, "RATE_REFRESH_PER_MIN")?,
            protected: limiter(config.rate_protected_per_min, "RATE_PROTECTED_PER_MIN")?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/users").route(web::post().to(handlers::create_user)))
            .service(
                web::scope("/employee")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/leave-account")
                            .route(web::get().to(employee::leave_account)),
                    ),
            )
            .service(
                web::scope("/vacation")
                    .service(
                        web::resource("")
                            .route(web::get().to(vacation::list_vacations))
                            .route(web::post().to(vacation::create_vacation)),
                    )
                    // before /{id}
                    .service(
                        web::resource("/available").route(web::get().to(vacation::available_days)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(vacation::get_vacation))
                            .route(web::put().to(vacation::update_vacation))
                            .route(web::delete().to(vacation::delete_vacation)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(vacation::approve_vacation)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(vacation::reject_vacation)),
                    ),
            )
            .service(
                web::scope("/salary")
                    .service(web::resource("").route(web::get().to(salary::list_salaries)))
                    .service(
                        web::resource("/import").route(web::post().to(salary::import_preview)),
                    )
                    .service(
                        web::resource("/import/{storage_id}")
                            .route(web::get().to(salary::get_import)),
                    )
                    .service(
                        web::resource("/import/{storage_id}/commit")
                            .route(web::post().to(salary::commit_import)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(salary::get_salary))),
            )
            .service(
                web::scope("/ffp")
                    .service(
                        web::resource("/event")
                            .route(web::post().to(ffp::create_event))
                            .route(web::get().to(ffp::list_events)),
                    )
                    .service(web::resource("/event/{id}").route(web::get().to(ffp::get_event)))
                    .service(
                        web::resource("/event/{id}/finish")
                            .route(web::post().to(ffp::finish_event)),
                    )
                    .service(web::resource("/debt").route(web::get().to(ffp::debt_list)))
                    .service(
                        web::resource("/debt/{id}/approve")
                            .route(web::put().to(ffp::approve_debt)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL)
//
// API REQUEST
//  └─ Authorization: Bearer access_token
//
// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair, the old refresh token is revoked

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_configured_rates() {
        assert!(build_limiter(5).is_some());
        assert!(build_limiter(120_000).is_some());
    }

    #[test]
    fn zero_rate_falls_back_to_one_per_minute() {
        assert!(build_limiter(0).is_some());
    }
}
