//! MySQL schema definitions
//!
//! Students keep `contact` and `address` as scalar columns (`phone`,
//! `email`, `province`, `city`) on this backend.

pub struct MySqlSchemaDefinitions;

impl MySqlSchemaDefinitions {
    pub const STUDENTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS students (
            id BIGINT PRIMARY KEY,
            name VARCHAR(50) NOT NULL,
            sex VARCHAR(16) NOT NULL,
            birthdate DATE NOT NULL,
            age INT NOT NULL CHECK (age >= 0),
            enroll_year INT NOT NULL,
            major VARCHAR(50) NOT NULL,
            class_id INT NOT NULL,
            phone VARCHAR(32) NULL,
            email VARCHAR(255) NULL,
            province VARCHAR(64) NULL,
            city VARCHAR(64) NULL,
            status VARCHAR(32) NOT NULL DEFAULT 'Active',
            password VARCHAR(255) NULL
        )
    "#;

    pub const TEACHERS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS teachers (
            teacher_id BIGINT PRIMARY KEY,
            name VARCHAR(50) NOT NULL,
            password VARCHAR(255) NOT NULL
        )
    "#;

    pub const ADMINISTRATORS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS administrators (
            admin_id BIGINT PRIMARY KEY,
            username VARCHAR(50) NOT NULL UNIQUE,
            password VARCHAR(255) NOT NULL
        )
    "#;

    pub const COURSES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS courses (
            course_id BIGINT PRIMARY KEY,
            course_name VARCHAR(100) NOT NULL UNIQUE,
            credit DECIMAL(3,1) NOT NULL CHECK (credit > 0),
            teacher_id BIGINT NOT NULL,
            FOREIGN KEY (teacher_id) REFERENCES teachers(teacher_id)
        )
    "#;

    pub const GRADES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS grades (
            grade_id BIGINT PRIMARY KEY,
            student_id BIGINT NOT NULL,
            course_id BIGINT NOT NULL,
            score DECIMAL(5,2) CHECK (score BETWEEN 0 AND 100),
            term VARCHAR(20) NOT NULL,
            FOREIGN KEY (student_id) REFERENCES students(id),
            FOREIGN KEY (course_id) REFERENCES courses(course_id),
            UNIQUE KEY uq_grades_student_course_term (student_id, course_id, term)
        )
    "#;

    pub const BOTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS bots (
            user_id BIGINT PRIMARY KEY,
            username VARCHAR(50) NOT NULL UNIQUE,
            password VARCHAR(255) NOT NULL
        )
    "#;

    /// Tables replaced on every import, dependents before the tables they reference
    pub const REPLACED_TABLES_DROP_ORDER: &'static [&'static str] =
        &["grades", "courses", "teachers", "students"];

    /// Every table, in creation order
    pub const CREATE_ORDER: &'static [(&'static str, &'static str)] = &[
        ("students", Self::STUDENTS_TABLE),
        ("teachers", Self::TEACHERS_TABLE),
        ("courses", Self::COURSES_TABLE),
        ("grades", Self::GRADES_TABLE),
        ("administrators", Self::ADMINISTRATORS_TABLE),
        ("bots", Self::BOTS_TABLE),
    ];

    pub const UPSERT_STUDENT: &'static str = r#"
        INSERT INTO students (
            id, name, sex, birthdate, age, enroll_year, major, class_id,
            phone, email, province, city, status, password
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            name = VALUES(name),
            sex = VALUES(sex),
            birthdate = VALUES(birthdate),
            age = VALUES(age),
            enroll_year = VALUES(enroll_year),
            major = VALUES(major),
            class_id = VALUES(class_id),
            phone = VALUES(phone),
            email = VALUES(email),
            province = VALUES(province),
            city = VALUES(city),
            status = VALUES(status),
            password = VALUES(password)
    "#;

    /// Integer columns are widened and the date is formatted so every
    /// value decodes as `i64` or `String`
    pub const SELECT_STUDENTS: &'static str = r#"
        SELECT CAST(id AS SIGNED), name, sex, DATE_FORMAT(birthdate, '%Y-%m-%d'),
               CAST(age AS SIGNED), CAST(enroll_year AS SIGNED), major,
               CAST(class_id AS SIGNED), phone, email, province, city, status, password
        FROM students
        ORDER BY id
    "#;
}
