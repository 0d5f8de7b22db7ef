use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::models::{
    Admin, Booking, BookingDetails, BookingStatus, Customer, CustomerSummary, NewBooking,
    NewCustomer, NewService, Service, ServiceSummary, ServiceUpdate, DEFAULT_SERVICE_DURATION,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Customers ──

pub fn get_customer(conn: &Connection, id: i64) -> anyhow::Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT customer_id, name, email, phone, created_at FROM customers WHERE customer_id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(4)?;
                Ok(Customer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()?;
    Ok(customer)
}

pub fn create_customer(conn: &Connection, customer: &NewCustomer) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO customers (name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            customer.name.trim(),
            customer.email.trim().to_lowercase(),
            customer.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "service_id, name, description, category, price, duration, is_available, created_at";

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    let created_at: String = row.get(7)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        duration_minutes: row.get(5)?,
        is_available: row.get(6)?,
        created_at: parse_timestamp(&created_at),
    })
}

pub fn get_service(conn: &Connection, id: i64) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE service_id = ?1"),
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

pub fn list_services(conn: &Connection, only_available: bool) -> anyhow::Result<Vec<Service>> {
    let sql = if only_available {
        format!("SELECT {SERVICE_COLUMNS} FROM services WHERE is_available = 1 ORDER BY name ASC")
    } else {
        format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY name ASC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn create_service(conn: &Connection, service: &NewService) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO services (name, description, category, price, duration, is_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.name.trim(),
            service.description,
            service.category,
            service.price,
            service.duration_minutes.unwrap_or(DEFAULT_SERVICE_DURATION),
            service.is_available.unwrap_or(true),
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_service(conn: &Connection, id: i64, update: &ServiceUpdate) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET
           name = COALESCE(?1, name),
           description = COALESCE(?2, description),
           category = COALESCE(?3, category),
           price = COALESCE(?4, price),
           duration = COALESCE(?5, duration),
           is_available = COALESCE(?6, is_available)
         WHERE service_id = ?7",
        params![
            update.name.as_deref().map(str::trim),
            update.description,
            update.category,
            update.price,
            update.duration_minutes,
            update.is_available,
            id,
        ],
    )?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.booking_id, b.customer_id, b.service_id, b.date, b.time, b.duration, b.address, \
     b.special_instructions, b.property_type, b.property_size, b.cleaning_frequency, b.status, \
     b.quoted_amount, b.created_at, b.updated_at";

const DETAILS_JOIN: &str = "c.name, c.email, c.phone, s.name, s.category, s.price, s.duration \
     FROM bookings b \
     JOIN customers c ON c.customer_id = b.customer_id \
     JOIN services s ON s.service_id = b.service_id";

pub fn find_bookings_matching(
    conn: &Connection,
    customer_id: i64,
    service_id: i64,
    date: NaiveDate,
    excluded_statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b \
         WHERE b.customer_id = ?1 AND b.service_id = ?2 AND b.date = ?3"
    );
    if !excluded_statuses.is_empty() {
        let placeholders: Vec<String> = (0..excluded_statuses.len())
            .map(|i| format!("?{}", i + 4))
            .collect();
        sql.push_str(&format!(" AND b.status NOT IN ({})", placeholders.join(", ")));
    }

    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(customer_id),
        Box::new(service_id),
        Box::new(date.format(DATE_FORMAT).to_string()),
    ];
    for status in excluded_statuses {
        values.push(Box::new(status.as_str()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn insert_booking(conn: &Connection, booking: &NewBooking) -> anyhow::Result<i64> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO bookings (customer_id, service_id, date, time, duration, address, special_instructions,
                               property_type, property_size, cleaning_frequency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            booking.customer_id,
            booking.service_id,
            booking.date.format(DATE_FORMAT).to_string(),
            booking.time,
            booking.duration_minutes,
            booking.address,
            booking.special_instructions,
            booking.property_type,
            booking.property_size,
            booking.cleaning_frequency,
            booking.status.as_str(),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.booking_id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    match result {
        Some(booking) => Ok(Some(booking?)),
        None => Ok(None),
    }
}

pub fn get_booking_details(conn: &Connection, id: i64) -> anyhow::Result<Option<BookingDetails>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS}, {DETAILS_JOIN} WHERE b.booking_id = ?1"),
            params![id],
            |row| Ok(parse_details_row(row)),
        )
        .optional()?;

    match result {
        Some(details) => Ok(Some(details?)),
        None => Ok(None),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<BookingDetails>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS}, {DETAILS_JOIN} WHERE b.status = ?1 \
                 ORDER BY b.date DESC, b.booking_id DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS}, {DETAILS_JOIN} \
                 ORDER BY b.date DESC, b.booking_id DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_details_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_customer_bookings(
    conn: &Connection,
    customer_id: i64,
) -> anyhow::Result<Vec<BookingDetails>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, {DETAILS_JOIN} WHERE b.customer_id = ?1 \
         ORDER BY b.date DESC, b.booking_id DESC"
    ))?;
    let rows = stmt.query_map(params![customer_id], |row| Ok(parse_details_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_bookings_since(conn: &Connection, after_id: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.booking_id > ?1 ORDER BY b.booking_id ASC"
    ))?;
    let rows = stmt.query_map(params![after_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: i64,
    status: BookingStatus,
    quoted_amount: Option<f64>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, quoted_amount = COALESCE(?2, quoted_amount), updated_at = ?3
         WHERE booking_id = ?4",
        params![status.as_str(), quoted_amount, now_timestamp(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(3)?;
    let status_str: String = row.get(11)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("corrupt booking date {date_str:?}: {e}"))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        service_id: row.get(2)?,
        date,
        time: row.get(4)?,
        duration_minutes: row.get(5)?,
        address: row.get(6)?,
        special_instructions: row.get(7)?,
        property_type: row.get(8)?,
        property_size: row.get(9)?,
        cleaning_frequency: row.get(10)?,
        status,
        quoted_amount: row.get(12)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn parse_details_row(row: &rusqlite::Row) -> anyhow::Result<BookingDetails> {
    let booking = parse_booking_row(row)?;
    let customer = CustomerSummary {
        id: booking.customer_id,
        name: row.get(15)?,
        email: row.get(16)?,
        phone: row.get(17)?,
    };
    let service = ServiceSummary {
        id: booking.service_id,
        name: row.get(18)?,
        category: row.get(19)?,
        price: row.get(20)?,
        duration_minutes: row.get(21)?,
    };
    Ok(BookingDetails {
        booking,
        customer,
        service,
    })
}

// ── Admins ──

const ADMIN_COLUMNS: &str =
    "admin_id, email, name, password_hash, is_active, created_at";

fn parse_admin_row(row: &rusqlite::Row) -> rusqlite::Result<Admin> {
    let created_at: String = row.get(5)?;
    Ok(Admin {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_timestamp(&created_at),
    })
}

pub fn create_admin(conn: &Connection, email: &str, name: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO admins (email, name, is_active, created_at) VALUES (?1, ?2, 0, ?3)",
        params![email, name, now_timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_admin(conn: &Connection, id: i64) -> anyhow::Result<Option<Admin>> {
    let admin = conn
        .query_row(
            &format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE admin_id = ?1"),
            params![id],
            parse_admin_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn get_admin_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<Admin>> {
    let admin = conn
        .query_row(
            &format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = ?1"),
            params![email],
            parse_admin_row,
        )
        .optional()?;
    Ok(admin)
}

/// Stores the credential and activates the account.
pub fn set_admin_password(conn: &Connection, id: i64, password_hash: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE admins SET password_hash = ?1, is_active = 1 WHERE admin_id = ?2",
        params![password_hash, id],
    )?;
    Ok(count > 0)
}

/// Removes a never-activated account, e.g. when its first code could not be delivered.
pub fn delete_inactive_admin(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM admins WHERE admin_id = ?1 AND is_active = 0",
        params![id],
    )?;
    Ok(count > 0)
}

// ── Admin OTPs ──

pub struct StoredOtp {
    pub code_hash: String,
    pub expires_at: NaiveDateTime,
    pub attempts: i64,
}

pub fn upsert_otp(
    conn: &Connection,
    admin_id: i64,
    code_hash: &str,
    expires_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO admin_otps (admin_id, code_hash, expires_at, attempts) VALUES (?1, ?2, ?3, 0)
         ON CONFLICT(admin_id) DO UPDATE SET
           code_hash = excluded.code_hash,
           expires_at = excluded.expires_at,
           attempts = 0",
        params![admin_id, code_hash, expires_at.format(TIMESTAMP_FORMAT).to_string()],
    )?;
    Ok(())
}

pub fn get_otp(conn: &Connection, admin_id: i64) -> anyhow::Result<Option<StoredOtp>> {
    let otp = conn
        .query_row(
            "SELECT code_hash, expires_at, attempts FROM admin_otps WHERE admin_id = ?1",
            params![admin_id],
            |row| {
                let expires_at: String = row.get(1)?;
                Ok(StoredOtp {
                    code_hash: row.get(0)?,
                    // An unreadable expiry counts as already expired.
                    expires_at: NaiveDateTime::parse_from_str(&expires_at, TIMESTAMP_FORMAT)
                        .unwrap_or(NaiveDateTime::MIN),
                    attempts: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(otp)
}

pub fn increment_otp_attempts(conn: &Connection, admin_id: i64) -> anyhow::Result<i64> {
    conn.execute(
        "UPDATE admin_otps SET attempts = attempts + 1 WHERE admin_id = ?1",
        params![admin_id],
    )?;
    let attempts: i64 = conn
        .query_row(
            "SELECT attempts FROM admin_otps WHERE admin_id = ?1",
            params![admin_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    Ok(attempts)
}

pub fn delete_otp(conn: &Connection, admin_id: i64) -> anyhow::Result<()> {
    conn.execute("DELETE FROM admin_otps WHERE admin_id = ?1", params![admin_id])?;
    Ok(())
}

pub fn delete_expired_otps(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM admin_otps WHERE expires_at <= ?1",
        params![now.format(TIMESTAMP_FORMAT).to_string()],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        create_customer(
            &conn,
            &NewCustomer {
                name: "Dana".to_string(),
                email: "Dana@Example.com ".to_string(),
                phone: None,
            },
        )
        .unwrap();
        create_service(
            &conn,
            &NewService {
                name: "Deep Clean".to_string(),
                description: None,
                category: Some("residential".to_string()),
                price: 180.0,
                duration_minutes: None,
                is_available: None,
            },
        )
        .unwrap();
        conn
    }

    fn new_booking(date: &str) -> NewBooking {
        NewBooking {
            customer_id: 1,
            service_id: 1,
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            time: "09:00".to_string(),
            duration_minutes: 120,
            address: "1 Main, X, Y 0001".to_string(),
            special_instructions: None,
            property_type: None,
            property_size: None,
            cleaning_frequency: None,
            status: BookingStatus::Requested,
        }
    }

    #[test]
    fn test_customer_email_normalized() {
        let conn = setup();
        let customer = get_customer(&conn, 1).unwrap().unwrap();
        assert_eq!(customer.email, "dana@example.com");
        assert!(get_customer(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_service_defaults() {
        let conn = setup();
        let service = get_service(&conn, 1).unwrap().unwrap();
        assert_eq!(service.duration_minutes, DEFAULT_SERVICE_DURATION);
        assert!(service.is_available);
    }

    #[test]
    fn test_update_service_partial() {
        let conn = setup();
        let update = ServiceUpdate {
            is_available: Some(false),
            ..Default::default()
        };
        assert!(update_service(&conn, 1, &update).unwrap());
        let service = get_service(&conn, 1).unwrap().unwrap();
        assert!(!service.is_available);
        assert_eq!(service.name, "Deep Clean");
        assert!(list_services(&conn, true).unwrap().is_empty());
        assert_eq!(list_services(&conn, false).unwrap().len(), 1);
    }

    #[test]
    fn test_find_bookings_matching_excludes_statuses() {
        let conn = setup();
        let id = insert_booking(&conn, &new_booking("2099-01-01")).unwrap();
        let date = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();

        let live =
            find_bookings_matching(&conn, 1, 1, date, &BookingStatus::TERMINAL_EXCLUDED).unwrap();
        assert_eq!(live.len(), 1);

        update_booking_status(&conn, id, BookingStatus::Cancelled, None).unwrap();
        let live =
            find_bookings_matching(&conn, 1, 1, date, &BookingStatus::TERMINAL_EXCLUDED).unwrap();
        assert!(live.is_empty());
        let all = find_bookings_matching(&conn, 1, 1, date, &[]).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_live_slot_index_rejects_second_insert() {
        let conn = setup();
        insert_booking(&conn, &new_booking("2099-01-01")).unwrap();
        let err = insert_booking(&conn, &new_booking("2099-01-01")).unwrap_err();
        let sqlite_err = err.downcast_ref::<rusqlite::Error>().unwrap();
        assert_eq!(
            sqlite_err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn test_booking_details_join() {
        let conn = setup();
        let id = insert_booking(&conn, &new_booking("2099-02-03")).unwrap();
        let details = get_booking_details(&conn, id).unwrap().unwrap();
        assert_eq!(details.customer.name, "Dana");
        assert_eq!(details.service.name, "Deep Clean");
        assert_eq!(details.booking.status, BookingStatus::Requested);
        assert_eq!(list_customer_bookings(&conn, 1).unwrap().len(), 1);
        assert_eq!(
            list_bookings(&conn, Some(BookingStatus::Confirmed), 10)
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_quoted_amount_kept_when_absent() {
        let conn = setup();
        let id = insert_booking(&conn, &new_booking("2099-02-03")).unwrap();
        update_booking_status(&conn, id, BookingStatus::Confirmed, Some(240.0)).unwrap();
        update_booking_status(&conn, id, BookingStatus::InProgress, None).unwrap();
        let booking = get_booking(&conn, id).unwrap().unwrap();
        assert_eq!(booking.quoted_amount, Some(240.0));
        assert_eq!(booking.status, BookingStatus::InProgress);
    }

    #[test]
    fn test_otp_lifecycle() {
        let conn = setup();
        let admin_id = create_admin(&conn, "ops@example.com", "Ops").unwrap();
        let expires = Utc::now().naive_utc() + chrono::Duration::minutes(10);
        upsert_otp(&conn, admin_id, "hash", &expires).unwrap();
        assert_eq!(increment_otp_attempts(&conn, admin_id).unwrap(), 1);

        upsert_otp(&conn, admin_id, "hash2", &expires).unwrap();
        let otp = get_otp(&conn, admin_id).unwrap().unwrap();
        assert_eq!(otp.code_hash, "hash2");
        assert_eq!(otp.attempts, 0);

        delete_otp(&conn, admin_id).unwrap();
        assert!(get_otp(&conn, admin_id).unwrap().is_none());
    }

    #[test]
    fn test_delete_inactive_admin_only() {
        let conn = setup();
        let pending = create_admin(&conn, "new@example.com", "New").unwrap();
        let expires = Utc::now().naive_utc() + chrono::Duration::minutes(10);
        upsert_otp(&conn, pending, "hash", &expires).unwrap();
        assert!(delete_inactive_admin(&conn, pending).unwrap());
        assert!(get_admin(&conn, pending).unwrap().is_none());
        // code goes with the account
        assert!(get_otp(&conn, pending).unwrap().is_none());

        let active = create_admin(&conn, "ops@example.com", "Ops").unwrap();
        set_admin_password(&conn, active, "$2b$04$placeholder").unwrap();
        assert!(!delete_inactive_admin(&conn, active).unwrap());
        assert!(get_admin(&conn, active).unwrap().unwrap().is_active);
    }
}
