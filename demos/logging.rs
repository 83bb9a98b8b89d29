//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use autowire::{
    ArgumentSpec, ClassDescriptor, ContainerBuilder, Definition, MapEnvironment, ObjectDefinition,
    ObjectRef, ParamSpec,
};
use std::sync::Arc;

// Example services
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
    audit: ObjectRef,
}

#[allow(dead_code)]
struct AuditLog {
    users: ObjectRef,
}

fn main() {
    // Uses JSON if logging-json is enabled, pretty otherwise
    autowire::logging::builder().trace().autowire_only().init();

    println!("=== Autowire Logging Demo ===\n");

    // Register classes (logs: "Registering class")
    let container = ContainerBuilder::new()
        .environment(MapEnvironment::new().set("DATABASE_URL", "postgres://localhost/mydb"))
        .register_class(
            ClassDescriptor::builder::<Database>("Database")
                .constructor(vec![ParamSpec::scalar("url", "string")], |args| {
                    Ok(Database {
                        url: args.string(0)?,
                    })
                })
                .build(),
        )
        .register_class(
            ClassDescriptor::builder::<UserService>("UserService")
                .constructor(
                    vec![
                        ParamSpec::class("db", "Database"),
                        ParamSpec::class("audit", "AuditLog"),
                    ],
                    |args| {
                        Ok(UserService {
                            db: args.object::<Database>(0)?,
                            audit: args.object_ref(1)?,
                        })
                    },
                )
                .build(),
        )
        .register_class(
            ClassDescriptor::builder::<AuditLog>("AuditLog")
                .constructor(vec![ParamSpec::class("users", "UserService")], |args| {
                    Ok(AuditLog {
                        users: args.object_ref(0)?,
                    })
                })
                .build(),
        )
        .define(Definition::env("db.url", "DATABASE_URL"))
        .define(
            ObjectDefinition::autowire("Database")
                .constructor_arg("url", ArgumentSpec::link("db.url")),
        )
        .build()
        .unwrap();

    // Autowired graph with a cycle (logs: "Cycle detected, deferring with a lazy proxy")
    let users = container.get("UserService").unwrap();

    // Cached on the second call (logs: "Entry resolved from cache")
    let again = container.get("UserService").unwrap();
    assert_eq!(users, again);

    // The audit log received a proxy; forcing it resolves to the real instance
    // (logs: "Lazy proxy initializing on first access")
    let audit = container.get("AuditLog").unwrap().downcast::<AuditLog>().unwrap();
    assert!(audit.users.downcast::<UserService>().is_ok());

    // Unknown identifier (logs: "No definition found")
    let missing = container.get("mailer");
    if let Err(err) = missing {
        println!("  [App] {err}");
    }

    // Clear the singleton cache (logs: "Container reset - singleton cache cleared")
    container.reset();

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
