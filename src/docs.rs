use crate::api::employee::{CreateEmployee, EmployeeListResponse, UpdateEmployee};
use crate::api::ffp::{AccountingInput, CreateEvent, DebtList, EventDetails};
use crate::api::salary::{ImportPreview, PaginatedSalaryResponse};
use crate::api::vacation::{
    AvailableDays, CreateVacation, UpdateVacation, VacationChanged, VacationListResponse,
};
use crate::auth::handlers::LoginResponse;
use crate::model::employee::Employee;
use crate::model::ffp::{FfpAccounting, FfpDebt, FfpEvent};
use crate::model::role::Role;
use crate::model::salary::{EmployeeSalary, SalaryType};
use crate::model::user::{CreateUser, LoginRequest};
use crate::model::vacation::{Vacation, VacationStatus};
use crate::service::ffp::DebtDraft;
use crate::service::salary_import::{FieldChange, ImportedElement, ImportedSheet, SalaryDraft};
use crate::service::vacation::LeaveAccount;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "staffdesk API",
        version = "1.0.0",
        description = r#"
## staffdesk

Back office of a small company: staff records, vacation, payroll and shared expenses.

### Key Features
- **Employees**
  - Create, update, list and view employee records and their leave account
- **Vacation**
  - Apply for leave, have it approved or rejected by the named manager, carry remaining
    days over into the next year
- **Salaries**
  - Import monthly salaries from the payroll sheet with a review step before saving
- **Financial Fair Play**
  - Split the costs of shared events and keep track of who owes whom

### Security
All endpoints except `/auth/*` need a **JWT Bearer** access token.
Roles: Admin, HR and Employee.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::create_user,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::leave_account,

        crate::api::vacation::list_vacations,
        crate::api::vacation::create_vacation,
        crate::api::vacation::get_vacation,
        crate::api::vacation::update_vacation,
        crate::api::vacation::delete_vacation,
        crate::api::vacation::approve_vacation,
        crate::api::vacation::reject_vacation,
        crate::api::vacation::available_days,

        crate::api::salary::list_salaries,
        crate::api::salary::get_salary,
        crate::api::salary::import_preview,
        crate::api::salary::get_import,
        crate::api::salary::commit_import,

        crate::api::ffp::create_event,
        crate::api::ffp::list_events,
        crate::api::ffp::get_event,
        crate::api::ffp::finish_event,
        crate::api::ffp::debt_list,
        crate::api::ffp::approve_debt
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            CreateUser,
            Role,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            EmployeeListResponse,
            LeaveAccount,
            Vacation,
            VacationStatus,
            CreateVacation,
            UpdateVacation,
            VacationChanged,
            VacationListResponse,
            AvailableDays,
            EmployeeSalary,
            SalaryType,
            PaginatedSalaryResponse,
            ImportPreview,
            ImportedSheet,
            ImportedElement,
            SalaryDraft,
            FieldChange,
            FfpEvent,
            FfpAccounting,
            FfpDebt,
            DebtDraft,
            AccountingInput,
            CreateEvent,
            EventDetails,
            DebtList
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and user administration"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Vacation", description = "Leave applications and vacation balance"),
        (name = "Salary", description = "Salaries and payroll sheet import"),
        (name = "FFP", description = "Shared event costs and debts"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/auth/login",
            "/api/employee/{employee_id}/leave-account",
            "/api/vacation/{vacation_id}/approve",
            "/api/salary/import/{storage_id}/commit",
            "/api/ffp/debt/{debt_id}/approve",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
