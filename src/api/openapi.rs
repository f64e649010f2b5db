//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, dashboard, health, loans, users};

/// Registers the JWT bearer scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Booklend API",
        version = "1.0.0",
        description = "Library loan REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::login,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Loans
        loans::issue_book,
        loans::return_book,
        loans::active_loans,
        loans::my_loans,
        // Dashboard
        dashboard::admin_stats,
        dashboard::user_stats,
    ),
    components(
        schemas(
            // Auth
            auth::SignupResponse,
            auth::LoginResponse,
            crate::models::user::Signup,
            crate::models::user::Login,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookQuery,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::UserQuery,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::IssueLoan,
            crate::models::loan::ReturnReceipt,
            // Dashboard
            crate::models::dashboard::AdminDashboardStats,
            crate::models::dashboard::UserDashboardStats,
            crate::models::dashboard::StatEntry,
            crate::models::dashboard::TimeSeriesEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Issuing and returning books"),
        (name = "dashboard", description = "Loan statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
