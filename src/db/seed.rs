//! Startup data: the permission catalog, built-in roles, the bootstrap admin and
//! an optional sample catalog.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::accounts::{self, NewUser};
use crate::config::AdminBootstrap;
use crate::error::Result;
use crate::rbac::SUPER_ADMIN;

const CRUD: &[&str] = &["ver", "crear", "editar", "eliminar"];

/// Every module with the actions that can be granted on it.
pub const MODULES: &[(&str, &[&str])] = &[
    ("dashboard", &["ver"]),
    ("usuarios", CRUD),
    ("roles", &["ver", "crear", "editar", "asignar"]),
    ("habitaciones", CRUD),
    ("reservas", &["ver", "crear", "editar", "eliminar", "confirmar", "cancelar"]),
    ("huespedes", CRUD),
    ("servicios", CRUD),
    ("planes", CRUD),
    ("promociones", CRUD),
];

enum Grants {
    Everything,
    Except(&'static [(&'static str, &'static str)]),
    Only(Vec<(&'static str, &'static str)>),
}

impl Grants {
    fn allows(&self, module: &str, action: &str) -> bool {
        match self {
            Grants::Everything => true,
            Grants::Except(denied) => !denied.contains(&(module, action)),
            Grants::Only(allowed) => allowed.contains(&(module, action)),
        }
    }
}

fn full(module: &'static str) -> [(&'static str, &'static str); 4] {
    [(module, "ver"), (module, "crear"), (module, "editar"), (module, "eliminar")]
}

const RECEPTIONIST: &[(&str, &str)] = &[
    ("dashboard", "ver"),
    ("reservas", "ver"),
    ("reservas", "crear"),
    ("reservas", "editar"),
    ("reservas", "confirmar"),
    ("reservas", "cancelar"),
    ("huespedes", "ver"),
    ("huespedes", "crear"),
    ("huespedes", "editar"),
    ("habitaciones", "ver"),
    ("servicios", "ver"),
    ("planes", "ver"),
    ("promociones", "ver"),
];

const READ_ONLY: &[(&str, &str)] = &[
    ("dashboard", "ver"),
    ("habitaciones", "ver"),
    ("servicios", "ver"),
    ("planes", "ver"),
    ("promociones", "ver"),
    ("reservas", "ver"),
    ("huespedes", "ver"),
];

const ACCOUNT_MANAGEMENT: &[(&str, &str)] = &[
    ("usuarios", "crear"),
    ("usuarios", "editar"),
    ("usuarios", "eliminar"),
    ("roles", "crear"),
    ("roles", "editar"),
    ("roles", "asignar"),
];

fn marketing() -> Vec<(&'static str, &'static str)> {
    let mut grants = vec![("dashboard", "ver")];
    grants.extend(full("servicios"));
    grants.extend(full("planes"));
    grants.extend(full("promociones"));
    grants
}

async fn create_role(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    grants: &Grants,
) -> Result<()> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO roles (name, description, active, created_at) VALUES (?, ?, 1, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    // Existing roles keep whatever permissions an administrator gave them.
    if inserted.rows_affected() == 0 {
        return Ok(());
    }

    let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    let permissions: Vec<(i64, String, String)> =
        sqlx::query_as("SELECT id, module, action FROM permissions")
            .fetch_all(pool)
            .await?;

    let mut granted = 0;
    for (permission_id, module, action) in permissions {
        if grants.allows(&module, &action) {
            sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(role_id)
                .bind(permission_id)
                .execute(pool)
                .await?;
            granted += 1;
        }
    }
    log::info!("Created role {} with {} permissions", name, granted);
    Ok(())
}

/// Creates the permission catalog and the built-in roles. Safe to run on every start.
pub async fn init_roles(pool: &SqlitePool) -> Result<()> {
    for (module, actions) in MODULES {
        for action in *actions {
            sqlx::query("INSERT OR IGNORE INTO permissions (module, action, description) VALUES (?, ?, ?)")
                .bind(module)
                .bind(action)
                .bind(format!("{} {}", action, module))
                .execute(pool)
                .await?;
        }
    }

    let roles: [(&str, &str, Grants); 5] = [
        (SUPER_ADMIN, "Full access to every module", Grants::Everything),
        (
            "admin_general",
            "Manages the hotel; cannot manage users or roles",
            Grants::Except(ACCOUNT_MANAGEMENT),
        ),
        ("recepcionista", "Front desk: reservations and guests", Grants::Only(RECEPTIONIST.to_vec())),
        ("solo_lectura", "Read-only access", Grants::Only(READ_ONLY.to_vec())),
        ("marketing", "Services, plans and promotions", Grants::Only(marketing())),
    ];
    for (name, description, grants) in &roles {
        create_role(pool, name, description, grants).await?;
    }

    let first_superuser: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE is_superuser = 1 ORDER BY id LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if let Some(user_id) = first_superuser {
        assign_super_admin(pool, user_id).await?;
    }
    Ok(())
}

async fn assign_super_admin(pool: &SqlitePool, user_id: i64) -> Result<()> {
    let assigned = sqlx::query(
        r#"
        INSERT OR IGNORE INTO user_roles (user_id, role_id, active, assigned_at)
        SELECT ?, id, 1, ? FROM roles WHERE name = ?
        "#,
    )
    .bind(user_id)
    .bind(Utc::now().naive_utc())
    .bind(SUPER_ADMIN)
    .execute(pool)
    .await?;
    if assigned.rows_affected() > 0 {
        log::info!("Assigned {} to user {}", SUPER_ADMIN, user_id);
    }
    Ok(())
}

/// Creates the configured superuser unless the username already exists.
pub async fn bootstrap_admin(pool: &SqlitePool, admin: &AdminBootstrap) -> Result<()> {
    if accounts::find_by_username(pool, &admin.username).await?.is_some() {
        return Ok(());
    }

    let mut conn = pool.acquire().await?;
    let user = accounts::create_user(
        &mut conn,
        NewUser {
            username: &admin.username,
            email: &admin.email,
            password: &admin.password,
            first_name: "Administrador",
            is_staff: true,
            is_superuser: true,
            is_active: true,
        },
    )
    .await?;
    drop(conn);

    log::info!("Created superuser {}", user.username);
    assign_super_admin(pool, user.id).await
}

struct SampleRoomType {
    name: &'static str,
    description: &'static str,
    price: f64,
    capacity: i64,
    stock: i64,
}

const SAMPLE_ROOM_TYPES: [SampleRoomType; 4] = [
    SampleRoomType {
        name: "Habitación Simple",
        description: "Habitación individual con cama simple, ideal para viajeros solos",
        price: 80.0,
        capacity: 1,
        stock: 10,
    },
    SampleRoomType {
        name: "Habitación Doble",
        description: "Habitación con cama doble o dos camas individuales",
        price: 120.0,
        capacity: 2,
        stock: 15,
    },
    SampleRoomType {
        name: "Suite Familiar",
        description: "Suite amplia con sala de estar, ideal para familias",
        price: 200.0,
        capacity: 4,
        stock: 5,
    },
    SampleRoomType {
        name: "Suite Presidencial",
        description: "Suite de lujo con vista panorámica y servicios exclusivos",
        price: 350.0,
        capacity: 2,
        stock: 2,
    },
];

/// "Suite Familiar" -> "FAM"
pub fn room_prefix(room_type_name: &str) -> String {
    room_type_name
        .split_whitespace()
        .last()
        .unwrap_or(room_type_name)
        .chars()
        .take(3)
        .collect::<String>()
        .to_uppercase()
}

/// Adds the sample room types and one room per unit of stock. Existing rows are left alone.
pub async fn populate_catalog(pool: &SqlitePool) -> Result<()> {
    for sample in &SAMPLE_ROOM_TYPES {
        let created = sqlx::query(
            r#"
            INSERT OR IGNORE INTO room_types (name, description, price, capacity, stock_total, stock_available, active)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(sample.name)
        .bind(sample.description)
        .bind(sample.price)
        .bind(sample.capacity)
        .bind(sample.stock)
        .bind(sample.stock)
        .execute(pool)
        .await?;
        if created.rows_affected() == 0 {
            continue;
        }

        let room_type_id: i64 = sqlx::query_scalar("SELECT id FROM room_types WHERE name = ?")
            .bind(sample.name)
            .fetch_one(pool)
            .await?;
        let prefix = room_prefix(sample.name);
        for i in 1..=sample.stock {
            let number = format!("{}{:03}", prefix, i);
            sqlx::query("INSERT OR IGNORE INTO rooms (number, room_type_id, notes) VALUES (?, ?, ?)")
                .bind(&number)
                .bind(room_type_id)
                .bind(format!("Habitación {} - {}", number, sample.name))
                .execute(pool)
                .await?;
        }
        log::info!("Seeded {} with {} rooms", sample.name, sample.stock);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_do_not_collide() {
        let prefixes: Vec<String> = SAMPLE_ROOM_TYPES.iter().map(|t| room_prefix(t.name)).collect();
        assert_eq!(prefixes, vec!["SIM", "DOB", "FAM", "PRE"]);
    }

    #[test]
    fn role_grants() {
        let admin = Grants::Except(ACCOUNT_MANAGEMENT);
        assert!(admin.allows("usuarios", "ver"));
        assert!(!admin.allows("roles", "asignar"));
        assert!(admin.allows("reservas", "confirmar"));

        let receptionist = Grants::Only(RECEPTIONIST.to_vec());
        assert!(receptionist.allows("reservas", "cancelar"));
        assert!(!receptionist.allows("reservas", "eliminar"));
    }
}
