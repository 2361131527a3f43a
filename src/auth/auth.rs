use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::TokenType;
use crate::model::vacation::Vacation;
use crate::service::vacation::VacationAccessError;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Builds the caller from a bearer token; refresh tokens are not accepted here.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".to_string()));
        }
        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by the auth middleware on protected routes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".to_string()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Internal("Config missing".to_string()))),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only".to_string()))
        }
    }

    /// Employee record of the caller.
    pub fn require_employee(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| VacationAccessError::NoEmployeeToUser.into())
    }

    /// The caller themself, or HR/admin acting for anyone.
    pub fn require_self_or_hr(&self, employee_id: u64) -> Result<(), AppError> {
        if self.role.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to access this employee".to_string()))
        }
    }

    /// Applicants may change their own applications.
    pub fn require_vacation_owner(&self, vacation: &Vacation) -> Result<(), AppError> {
        if self.role.is_hr_or_admin() || self.employee_id == Some(vacation.employee_id) {
            Ok(())
        } else {
            Err(VacationAccessError::NotOwner.into())
        }
    }

    /// Manager named in the application, HR or admin.
    pub fn require_vacation_decider(&self, vacation: &Vacation) -> Result<(), AppError> {
        if self.role.is_hr_or_admin() || self.employee_id == Some(vacation.manager_id) {
            Ok(())
        } else {
            Err(VacationAccessError::NotDecider.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::model::vacation::VacationStatus;
    use chrono::NaiveDate;

    const SECRET: &str = "test-secret";

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "anna".to_string(),
            role,
            employee_id,
        }
    }

    fn vacation() -> Vacation {
        Vacation {
            id: 1,
            employee_id: 10,
            manager_id: 20,
            substitution_id: 30,
            start_date: NaiveDate::from_ymd_opt(2026, 7, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 10).unwrap(),
            status: VacationStatus::InProgress,
            is_special: false,
            deleted: false,
            created_at: None,
        }
    }

    #[test]
    fn access_token_yields_user() {
        let token = generate_access_token(1, "anna".to_string(), 3, Some(10), SECRET, 60).unwrap();
        let user = AuthUser::from_token(&token, SECRET).unwrap();
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.employee_id, Some(10));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let (token, _) = generate_refresh_token(1, "anna".to_string(), 3, None, SECRET, 60).unwrap();
        assert!(matches!(
            AuthUser::from_token(&token, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(1, "anna".to_string(), 3, None, SECRET, 60).unwrap();
        assert!(AuthUser::from_token(&token, "other").is_err());
    }

    #[test]
    fn manager_decides_and_applicant_owns() {
        let v = vacation();
        assert!(user(Role::Employee, Some(20)).require_vacation_decider(&v).is_ok());
        assert!(user(Role::Employee, Some(10)).require_vacation_decider(&v).is_err());
        assert!(user(Role::Hr, None).require_vacation_decider(&v).is_ok());

        assert!(user(Role::Employee, Some(10)).require_vacation_owner(&v).is_ok());
        assert!(user(Role::Employee, Some(30)).require_vacation_owner(&v).is_err());
    }

    #[test]
    fn users_without_employee_cannot_request_leave() {
        assert!(matches!(
            user(Role::Admin, None).require_employee(),
            Err(AppError::VacationAccess(VacationAccessError::NoEmployeeToUser))
        ));
    }

    #[actix_web::test]
    async fn extractor_reuses_user_from_middleware() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(user(Role::Hr, Some(7)));

        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.role, Role::Hr);
        assert_eq!(extracted.employee_id, Some(7));
    }

    #[actix_web::test]
    async fn extractor_without_token_is_unauthorized() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        assert!(matches!(
            AuthUser::extract(&req).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
