//! SQL query constants
//!
//! Contains the schema and every statement the postgres store runs.

/// Idempotent schema, executed at startup
pub const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS departments (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        email VARCHAR(254) NOT NULL DEFAULT '',
        password_hash VARCHAR(255) NOT NULL,
        first_name VARCHAR(150) NOT NULL DEFAULT '',
        last_name VARCHAR(150) NOT NULL DEFAULT '',
        is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
        is_staff BOOLEAN NOT NULL DEFAULT FALSE,
        phone_number VARCHAR(15),
        region VARCHAR(100),
        district VARCHAR(100),
        profile_picture VARCHAR(255),
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (LOWER(email)) WHERE email <> '';

    CREATE TABLE IF NOT EXISTS user_groups (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_name VARCHAR(20) NOT NULL CHECK (group_name IN ('CEO', 'HOD', 'EMPLOYEE')),
        UNIQUE (user_id, group_name)
    );

    CREATE TABLE IF NOT EXISTS user_departments (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        UNIQUE (user_id, department_id)
    );

    CREATE TABLE IF NOT EXISTS attachments (
        id SERIAL PRIMARY KEY,
        kind VARCHAR(10) NOT NULL CHECK (kind IN ('picture', 'video', 'voice', 'file')),
        url VARCHAR(500) NOT NULL,
        file_name VARCHAR(255) NOT NULL,
        content_type VARCHAR(255) NOT NULL,
        size_bytes BIGINT NOT NULL,
        sha256 VARCHAR(64) NOT NULL,
        uploaded_by INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS complaints (
        id SERIAL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        description TEXT NOT NULL,
        complainant_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        targeted_department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        targeted_personnel_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status VARCHAR(20) NOT NULL DEFAULT 'Opened' CHECK (status IN ('Opened', 'Forwarded', 'Closed')),
        date_added TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        date_modified TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS complaints_department_idx ON complaints (targeted_department_id);
    CREATE INDEX IF NOT EXISTS complaints_complainant_idx ON complaints (complainant_id);
    CREATE INDEX IF NOT EXISTS complaints_personnel_idx ON complaints (targeted_personnel_id);

    CREATE TABLE IF NOT EXISTS complaint_attachments (
        complaint_id INTEGER NOT NULL REFERENCES complaints(id) ON DELETE CASCADE,
        attachment_id INTEGER NOT NULL REFERENCES attachments(id) ON DELETE CASCADE,
        PRIMARY KEY (complaint_id, attachment_id)
    );

    CREATE TABLE IF NOT EXISTS remarks (
        id SERIAL PRIMARY KEY,
        complaint_id INTEGER NOT NULL REFERENCES complaints(id) ON DELETE CASCADE,
        respondent_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        status VARCHAR(20) NOT NULL CHECK (status IN ('Forwarded', 'Closed')),
        targeted_department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        targeted_personnel_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        date TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS remarks_complaint_idx ON remarks (complaint_id);
    CREATE INDEX IF NOT EXISTS remarks_personnel_idx ON remarks (targeted_personnel_id);

    CREATE TABLE IF NOT EXISTS remark_attachments (
        remark_id INTEGER NOT NULL REFERENCES remarks(id) ON DELETE CASCADE,
        attachment_id INTEGER NOT NULL REFERENCES attachments(id) ON DELETE CASCADE,
        PRIMARY KEY (remark_id, attachment_id)
    );

    CREATE TABLE IF NOT EXISTS department_history (
        id SERIAL PRIMARY KEY,
        complaint_id INTEGER NOT NULL REFERENCES complaints(id) ON DELETE CASCADE,
        department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        status VARCHAR(20) NOT NULL CHECK (status IN ('Opened', 'Forwarded', 'Closed')),
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
"#;

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

pub const INSERT_DEPARTMENT: &str = r#"
    INSERT INTO departments (name, description)
    VALUES ($1, $2)
    RETURNING id, name, description
"#;

pub const GET_DEPARTMENT: &str = "SELECT id, name, description FROM departments WHERE id = $1";

pub const LIST_DEPARTMENTS: &str = "SELECT id, name, description FROM departments ORDER BY name, id";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, password_hash, first_name, last_name,
                       is_superuser, is_staff, profile_picture)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING id
"#;

/// Groups are inserted in the order given so the first one stays first
pub const INSERT_USER_GROUPS: &str = r#"
    INSERT INTO user_groups (user_id, group_name)
    SELECT $1, g FROM UNNEST($2::varchar[]) WITH ORDINALITY AS t(g, n)
    ORDER BY n
"#;

pub const INSERT_USER_DEPARTMENTS: &str = r#"
    INSERT INTO user_departments (user_id, department_id)
    SELECT $1, d FROM UNNEST($2::int[]) WITH ORDINALITY AS t(d, n)
    ORDER BY n
"#;

pub const GET_USER: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.is_superuser, u.is_staff, u.phone_number, u.region, u.district,
           u.profile_picture, u.date_joined,
           ARRAY(SELECT g.group_name FROM user_groups g WHERE g.user_id = u.id ORDER BY g.id) AS groups,
           ARRAY(SELECT d.department_id FROM user_departments d WHERE d.user_id = u.id ORDER BY d.id) AS department_ids
    FROM users u
    WHERE u.id = $1
"#;

pub const FIND_USER_BY_USERNAME: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.is_superuser, u.is_staff, u.phone_number, u.region, u.district,
           u.profile_picture, u.date_joined,
           ARRAY(SELECT g.group_name FROM user_groups g WHERE g.user_id = u.id ORDER BY g.id) AS groups,
           ARRAY(SELECT d.department_id FROM user_departments d WHERE d.user_id = u.id ORDER BY d.id) AS department_ids
    FROM users u
    WHERE u.username = $1
"#;

pub const LIST_USERS: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.is_superuser, u.is_staff, u.phone_number, u.region, u.district,
           u.profile_picture, u.date_joined,
           ARRAY(SELECT g.group_name FROM user_groups g WHERE g.user_id = u.id ORDER BY g.id) AS groups,
           ARRAY(SELECT d.department_id FROM user_departments d WHERE d.user_id = u.id ORDER BY d.id) AS department_ids
    FROM users u
    ORDER BY u.username
"#;

pub const LOCK_USER: &str = "SELECT id FROM users WHERE id = $1 FOR UPDATE";

pub const UPDATE_USER_PROFILE: &str = r#"
    UPDATE users
    SET username = $2, email = $3, first_name = $4, last_name = $5, phone_number = $6,
        region = $7, district = $8, profile_picture = $9
    WHERE id = $1
"#;

pub const SET_PASSWORD: &str = "UPDATE users SET password_hash = $2 WHERE id = $1";

pub const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";

// ---------------------------------------------------------------------------
// Complaints
// ---------------------------------------------------------------------------

pub const INSERT_COMPLAINT: &str = r#"
    INSERT INTO complaints (title, description, complainant_id, targeted_department_id,
                            targeted_personnel_id, status)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id
"#;

pub const LINK_COMPLAINT_ATTACHMENTS: &str = r#"
    INSERT INTO complaint_attachments (complaint_id, attachment_id)
    SELECT $1, UNNEST($2::int[])
    ON CONFLICT DO NOTHING
"#;

pub const GET_COMPLAINT: &str = r#"
    SELECT c.id, c.title, c.description, c.complainant_id, c.targeted_department_id,
           c.targeted_personnel_id, c.status, c.date_added, c.date_modified,
           ARRAY(SELECT ca.attachment_id FROM complaint_attachments ca
                 WHERE ca.complaint_id = c.id ORDER BY ca.attachment_id) AS attachment_ids
    FROM complaints c
    WHERE c.id = $1
"#;

/// Row lock serializing every save of one complaint
pub const LOCK_COMPLAINT: &str = "SELECT id FROM complaints WHERE id = $1 FOR UPDATE";

pub const LIST_COMPLAINTS: &str = r#"
    SELECT c.id, c.title, c.description, c.complainant_id, c.targeted_department_id,
           c.targeted_personnel_id, c.status, c.date_added, c.date_modified,
           ARRAY(SELECT ca.attachment_id FROM complaint_attachments ca
                 WHERE ca.complaint_id = c.id ORDER BY ca.attachment_id) AS attachment_ids
    FROM complaints c
    ORDER BY c.date_added DESC, c.id DESC
"#;

pub const LIST_COMPLAINTS_BY_DEPARTMENT: &str = r#"
    SELECT c.id, c.title, c.description, c.complainant_id, c.targeted_department_id,
           c.targeted_personnel_id, c.status, c.date_added, c.date_modified,
           ARRAY(SELECT ca.attachment_id FROM complaint_attachments ca
                 WHERE ca.complaint_id = c.id ORDER BY ca.attachment_id) AS attachment_ids
    FROM complaints c
    WHERE c.targeted_department_id = $1
    ORDER BY c.date_added DESC, c.id DESC
"#;

/// Filed by, targeted at, or targeted through a remark at `$1`
pub const LIST_COMPLAINTS_INVOLVING: &str = r#"
    SELECT c.id, c.title, c.description, c.complainant_id, c.targeted_department_id,
           c.targeted_personnel_id, c.status, c.date_added, c.date_modified,
           ARRAY(SELECT ca.attachment_id FROM complaint_attachments ca
                 WHERE ca.complaint_id = c.id ORDER BY ca.attachment_id) AS attachment_ids
    FROM complaints c
    WHERE c.complainant_id = $1
       OR c.targeted_personnel_id = $1
       OR EXISTS (SELECT 1 FROM remarks r
                  WHERE r.complaint_id = c.id AND r.targeted_personnel_id = $1)
    ORDER BY c.date_added DESC, c.id DESC
"#;

pub const UPDATE_COMPLAINT: &str = r#"
    UPDATE complaints
    SET title = $2, description = $3, status = $4, targeted_department_id = $5,
        targeted_personnel_id = $6, date_modified = $7
    WHERE id = $1
"#;

pub const DELETE_COMPLAINT: &str = "DELETE FROM complaints WHERE id = $1";

pub const INSERT_HISTORY: &str = r#"
    INSERT INTO department_history (complaint_id, department_id, status)
    VALUES ($1, $2, $3)
"#;

pub const LIST_HISTORY: &str = r#"
    SELECT id, complaint_id, department_id, status, recorded_at
    FROM department_history
    WHERE complaint_id = $1
    ORDER BY id
"#;

// ---------------------------------------------------------------------------
// Remarks
// ---------------------------------------------------------------------------

pub const INSERT_REMARK: &str = r#"
    INSERT INTO remarks (complaint_id, respondent_id, content, status,
                         targeted_department_id, targeted_personnel_id)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id
"#;

pub const LINK_REMARK_ATTACHMENTS: &str = r#"
    INSERT INTO remark_attachments (remark_id, attachment_id)
    SELECT $1, UNNEST($2::int[])
    ON CONFLICT DO NOTHING
"#;

pub const UNLINK_REMARK_ATTACHMENTS: &str = "DELETE FROM remark_attachments WHERE remark_id = $1";

pub const UPDATE_REMARK_CONTENT: &str = "UPDATE remarks SET content = $2 WHERE id = $1";

pub const GET_REMARK: &str = r#"
    SELECT r.id, r.complaint_id, r.respondent_id, r.content, r.status,
           r.targeted_department_id, r.targeted_personnel_id, r.date,
           ARRAY(SELECT ra.attachment_id FROM remark_attachments ra
                 WHERE ra.remark_id = r.id ORDER BY ra.attachment_id) AS attachment_ids
    FROM remarks r
    WHERE r.id = $1
"#;

pub const LOCK_REMARK: &str = "SELECT id, respondent_id FROM remarks WHERE id = $1 FOR UPDATE";

pub const LIST_REMARKS: &str = r#"
    SELECT r.id, r.complaint_id, r.respondent_id, r.content, r.status,
           r.targeted_department_id, r.targeted_personnel_id, r.date,
           ARRAY(SELECT ra.attachment_id FROM remark_attachments ra
                 WHERE ra.remark_id = r.id ORDER BY ra.attachment_id) AS attachment_ids
    FROM remarks r
    WHERE r.complaint_id = $1
    ORDER BY r.date, r.id
"#;

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

pub const INSERT_ATTACHMENT: &str = r#"
    INSERT INTO attachments (kind, url, file_name, content_type, size_bytes, sha256, uploaded_by)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id, kind, url, file_name, content_type, size_bytes, sha256, uploaded_by, uploaded_at
"#;

/// First id in `$1` that is missing or was uploaded by someone other than `$2`
pub const FOREIGN_ATTACHMENT: &str = r#"
    SELECT ids.id
    FROM UNNEST($1::int[]) AS ids(id)
    WHERE NOT EXISTS (
        SELECT 1 FROM attachments a WHERE a.id = ids.id AND a.uploaded_by = $2
    )
    LIMIT 1
"#;

pub const GET_ATTACHMENTS: &str = r#"
    SELECT id, kind, url, file_name, content_type, size_bytes, sha256, uploaded_by, uploaded_at
    FROM attachments
    WHERE id = ANY($1)
    ORDER BY id
"#;
