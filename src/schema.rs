use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Students,
    Faculty,
    Courses,
    Departments,
    Enrollment,
    Attendance,
    Tasks,
    Deals,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Students,
        EntityKind::Faculty,
        EntityKind::Courses,
        EntityKind::Departments,
        EntityKind::Enrollment,
        EntityKind::Attendance,
        EntityKind::Tasks,
        EntityKind::Deals,
    ];

    /// IPC method prefix, e.g. `students` in `students.list`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Faculty => "faculty",
            Self::Courses => "courses",
            Self::Departments => "departments",
            Self::Enrollment => "enrollment",
            Self::Attendance => "attendance",
            Self::Tasks => "tasks",
            Self::Deals => "deals",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == s)
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.schema().table == table)
    }

    /// Singular noun used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Students => "Student",
            Self::Faculty => "Faculty member",
            Self::Courses => "Course",
            Self::Departments => "Department",
            Self::Enrollment => "Enrollment",
            Self::Attendance => "Attendance record",
            Self::Tasks => "Task",
            Self::Deals => "Deal",
        }
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Self::Students => &STUDENTS,
            Self::Faculty => &FACULTY,
            Self::Courses => &COURSES,
            Self::Departments => &DEPARTMENTS,
            Self::Enrollment => &ENROLLMENT,
            Self::Attendance => &ATTENDANCE,
            Self::Tasks => &TASKS,
            Self::Deals => &DEALS,
        }
    }
}

/// How a form value is turned into the value submitted to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    /// Passed through like `Text`, rendered with the safe date formatter.
    Date,
    /// Only a literal `true` is true.
    Flag,
    Integer,
    IntegerOrZero,
    Float,
    FloatOrZero,
}

/// Fields the store stamps on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamps {
    None,
    /// `createdAt` on create, `updatedAt` on every write (RFC 3339).
    Timestamps,
    /// `createdAt` on create, date only.
    CreatedDate,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub coercion: Coercion,
    pub required: bool,
}

const fn field(name: &'static str, coercion: Coercion) -> FieldSpec {
    FieldSpec {
        name,
        coercion,
        required: false,
    }
}

const fn required(name: &'static str, coercion: Coercion) -> FieldSpec {
    FieldSpec {
        name,
        coercion,
        required: true,
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Table name on the record service.
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    /// Text fields OR'd together by the screen's search box.
    pub search_fields: &'static [&'static str],
    /// Categorical filters the screen offers.
    pub filter_fields: &'static [&'static str],
    /// Fields matched by `Gateway::search`. Empty when the kind has no search operation.
    pub service_search_fields: &'static [&'static str],
    pub stamps: Stamps,
}

impl EntitySchema {
    pub fn date_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.coercion == Coercion::Date)
            .map(|f| f.name)
    }

    pub fn supports_search(&self) -> bool {
        !self.service_search_fields.is_empty()
    }

    /// Required fields that are absent, null, blank, or a numeric zero.
    pub fn missing_required(&self, form: &Map<String, Value>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| match form.get(f.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Number(n)) => {
                    matches!(f.coercion, Coercion::Integer | Coercion::Float) && n.as_f64() == Some(0.0)
                }
                Some(_) => false,
            })
            .map(|f| f.name.to_string())
            .collect()
    }

    /// Maps flat form data onto the submitted record shape. Undeclared keys are dropped;
    /// absent text fields stay absent. The `*OrZero` defaults apply only when creating;
    /// an update sends null for a blank number.
    pub fn coerce(&self, form: &Map<String, Value>, creating: bool) -> Map<String, Value> {
        let mut out = Map::new();
        for f in self.fields {
            let raw = form.get(f.name);
            let coercion = match f.coercion {
                Coercion::IntegerOrZero if !creating => Coercion::Integer,
                Coercion::FloatOrZero if !creating => Coercion::Float,
                c => c,
            };
            let v = match coercion {
                Coercion::Text | Coercion::Date => match raw {
                    Some(v) => v.clone(),
                    None => continue,
                },
                Coercion::Flag => Value::Bool(matches!(raw, Some(Value::Bool(true)))),
                Coercion::Integer => raw.and_then(parse_int).map(Value::from).unwrap_or(Value::Null),
                Coercion::IntegerOrZero => match raw.and_then(parse_int) {
                    Some(n) if n != 0 => Value::from(n),
                    _ => Value::from(0),
                },
                Coercion::Float => raw
                    .and_then(parse_float)
                    .and_then(float_value)
                    .unwrap_or(Value::Null),
                Coercion::FloatOrZero => match raw.and_then(parse_float) {
                    Some(x) if x != 0.0 => float_value(x).unwrap_or(Value::from(0)),
                    _ => Value::from(0),
                },
            };
            out.insert(f.name.to_string(), v);
        }
        out
    }
}

fn float_value(x: f64) -> Option<Value> {
    serde_json::Number::from_f64(x).map(Value::Number)
}

/// Leading signed integer of a string or the truncation of a number. `None` is NaN.
pub fn parse_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.is_finite() {
                Some(f.trunc() as i64)
            } else {
                None
            }
        }
        Value::String(s) => parse_int_str(s),
        _ => None,
    }
}

fn parse_int_str(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let (neg, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let n: i64 = digits[..end].parse().ok()?;
    Some(if neg { -n } else { n })
}

/// Longest float prefix of a string, or the number itself. `None` is NaN.
pub fn parse_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_str(s),
        _ => None,
    }
}

fn parse_float_str(s: &str) -> Option<f64> {
    let t = s.trim_start();
    let candidate_len = t
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    let candidate = &t[..candidate_len];
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
        .filter(|x| x.is_finite())
}

use Coercion::{Date, Flag, Float, FloatOrZero, Integer, IntegerOrZero, Text};

static STUDENT_FIELDS: [FieldSpec; 12] = [
    required("first_name_c", Text),
    required("last_name_c", Text),
    required("email_c", Text),
    field("phone_c", Text),
    field("date_of_birth_c", Date),
    field("address_c", Text),
    field("student_id_c", Text),
    field("enrollment_date_c", Date),
    field("status_c", Text),
    field("department_c", Integer),
    field("year_c", Integer),
    field("gpa_c", Float),
];

static FACULTY_FIELDS: [FieldSpec; 12] = [
    required("first_name_c", Text),
    required("last_name_c", Text),
    required("email_c", Text),
    field("phone_c", Text),
    field("faculty_id_c", Text),
    field("position_c", Text),
    field("department_c", Integer),
    field("hire_date_c", Date),
    field("salary_c", Float),
    field("status_c", Text),
    field("office_location_c", Text),
    field("specialization_c", Text),
];

static COURSE_FIELDS: [FieldSpec; 12] = [
    required("course_code_c", Text),
    required("title_c", Text),
    field("description_c", Text),
    field("credits_c", Integer),
    field("department_c", Integer),
    field("instructor_c", Integer),
    field("semester_c", Text),
    field("year_c", Integer),
    field("max_students_c", Integer),
    field("enrolled_count_c", IntegerOrZero),
    field("status_c", Text),
    field("schedule_c", Text),
];

static DEPARTMENT_FIELDS: [FieldSpec; 12] = [
    required("name_c", Text),
    required("code_c", Text),
    field("description_c", Text),
    field("head_c", Integer),
    field("building_c", Text),
    field("phone_c", Text),
    field("email_c", Text),
    field("budget_c", Float),
    field("established_year_c", Integer),
    field("student_count_c", IntegerOrZero),
    field("faculty_count_c", IntegerOrZero),
    field("status_c", Text),
];

static ENROLLMENT_FIELDS: [FieldSpec; 12] = [
    required("student_c", Integer),
    required("course_c", Integer),
    field("enrollment_date_c", Date),
    field("grade_c", Text),
    field("status_c", Text),
    field("semester_c", Text),
    field("year_c", Integer),
    field("credits_c", Integer),
    field("attendance_percentage_c", FloatOrZero),
    field("midterm_grade_c", Text),
    field("final_grade_c", Text),
    field("completion_date_c", Date),
];

static ATTENDANCE_FIELDS: [FieldSpec; 12] = [
    required("student_c", Integer),
    required("course_c", Integer),
    required("date_c", Date),
    field("status_c", Text),
    field("time_in_c", Text),
    field("time_out_c", Text),
    field("notes_c", Text),
    field("marked_by_c", Integer),
    field("semester_c", Text),
    field("week_number_c", Integer),
    field("class_duration_c", Integer),
    field("excused_c", Flag),
];

static TASK_FIELDS: [FieldSpec; 6] = [
    required("title", Text),
    field("description", Text),
    field("priority", Text),
    field("status", Text),
    required("dueDate", Date),
    required("assignedTo", Text),
];

static DEAL_FIELDS: [FieldSpec; 13] = [
    required("name", Text),
    field("description", Text),
    required("clientName", Text),
    field("clientEmail", Text),
    field("clientPhone", Text),
    required("value", Float),
    field("currency", Text),
    required("status", Text),
    required("priority", Text),
    required("category", Text),
    field("startDate", Date),
    field("expectedCloseDate", Date),
    field("actualCloseDate", Date),
];

static STUDENTS: EntitySchema = EntitySchema {
    kind: EntityKind::Students,
    table: "student_c",
    fields: &STUDENT_FIELDS,
    search_fields: &["first_name_c", "last_name_c", "email_c", "student_id_c"],
    filter_fields: &["status_c", "department_c", "year_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static FACULTY: EntitySchema = EntitySchema {
    kind: EntityKind::Faculty,
    table: "faculty_c",
    fields: &FACULTY_FIELDS,
    search_fields: &["first_name_c", "last_name_c", "email_c", "faculty_id_c"],
    filter_fields: &["status_c", "department_c", "position_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static COURSES: EntitySchema = EntitySchema {
    kind: EntityKind::Courses,
    table: "course_c",
    fields: &COURSE_FIELDS,
    search_fields: &["course_code_c", "title_c", "description_c"],
    filter_fields: &["status_c", "department_c", "semester_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static DEPARTMENTS: EntitySchema = EntitySchema {
    kind: EntityKind::Departments,
    table: "department_c",
    fields: &DEPARTMENT_FIELDS,
    search_fields: &["name_c", "code_c", "building_c"],
    filter_fields: &["status_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static ENROLLMENT: EntitySchema = EntitySchema {
    kind: EntityKind::Enrollment,
    table: "enrollment_c",
    fields: &ENROLLMENT_FIELDS,
    search_fields: &["grade_c", "semester_c", "status_c"],
    filter_fields: &["status_c", "semester_c", "course_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static ATTENDANCE: EntitySchema = EntitySchema {
    kind: EntityKind::Attendance,
    table: "attendance_c",
    fields: &ATTENDANCE_FIELDS,
    search_fields: &["notes_c", "semester_c", "status_c"],
    filter_fields: &["status_c", "course_c", "date_c"],
    service_search_fields: &[],
    stamps: Stamps::None,
};

static TASKS: EntitySchema = EntitySchema {
    kind: EntityKind::Tasks,
    table: "task",
    fields: &TASK_FIELDS,
    search_fields: &["title", "description", "assignedTo"],
    filter_fields: &["status", "priority"],
    service_search_fields: &["title", "description", "assignedTo"],
    stamps: Stamps::CreatedDate,
};

static DEALS: EntitySchema = EntitySchema {
    kind: EntityKind::Deals,
    table: "deal",
    fields: &DEAL_FIELDS,
    search_fields: &["name", "clientName", "description"],
    filter_fields: &["status", "priority"],
    service_search_fields: &[],
    stamps: Stamps::Timestamps,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn parse_int_follows_leading_prefix() {
        assert_eq!(parse_int(&json!("42")), Some(42));
        assert_eq!(parse_int(&json!("  -7 apples")), Some(-7));
        assert_eq!(parse_int(&json!("3.9")), Some(3));
        assert_eq!(parse_int(&json!(3.9)), Some(3));
        assert_eq!(parse_int(&json!("")), None);
        assert_eq!(parse_int(&json!("abc")), None);
        assert_eq!(parse_int(&json!(true)), None);
    }

    #[test]
    fn parse_float_follows_longest_prefix() {
        assert_eq!(parse_float(&json!("3.75")), Some(3.75));
        assert_eq!(parse_float(&json!("1.5e3kg")), Some(1500.0));
        assert_eq!(parse_float(&json!("12.")), Some(12.0));
        assert_eq!(parse_float(&json!("-")), None);
        assert_eq!(parse_float(&json!(null)), None);
    }

    #[test]
    fn coerce_students_form() {
        let out = STUDENTS.coerce(
            &form(json!({
            "first_name_c": "Ada",
            "last_name_c": "Lovelace",
            "email_c": "ada@example.edu",
            "department_c": "3",
            "year_c": "",
            "gpa_c": "3.85",
            "unexpected": "dropped"
            })),
            true,
        );
        assert_eq!(out["first_name_c"], json!("Ada"));
        assert_eq!(out["department_c"], json!(3));
        assert_eq!(out["year_c"], Value::Null);
        assert_eq!(out["gpa_c"], json!(3.85));
        assert!(!out.contains_key("unexpected"));
        assert!(!out.contains_key("phone_c"));
    }

    #[test]
    fn coerce_or_zero_and_flag_fields() {
        let courses = COURSES.coerce(&form(json!({ "enrolled_count_c": "n/a" })), true);
        assert_eq!(courses["enrolled_count_c"], json!(0));

        let att = ATTENDANCE.coerce(&form(json!({ "excused_c": "true" })), true);
        assert_eq!(att["excused_c"], json!(false));
        let att = ATTENDANCE.coerce(&form(json!({ "excused_c": true })), false);
        assert_eq!(att["excused_c"], json!(true));

        let enr = ENROLLMENT.coerce(&form(json!({ "attendance_percentage_c": "92.5" })), true);
        assert_eq!(enr["attendance_percentage_c"], json!(92.5));
    }

    #[test]
    fn or_zero_defaults_only_on_create() {
        let blank = form(json!({ "student_count_c": "", "faculty_count_c": "12" }));
        let created = DEPARTMENTS.coerce(&blank, true);
        assert_eq!(created["student_count_c"], json!(0));
        let updated = DEPARTMENTS.coerce(&blank, false);
        assert_eq!(updated["student_count_c"], Value::Null);
        assert_eq!(updated["faculty_count_c"], json!(12));

        let enr = ENROLLMENT.coerce(&form(json!({ "attendance_percentage_c": "" })), false);
        assert_eq!(enr["attendance_percentage_c"], Value::Null);
    }

    #[test]
    fn missing_required_treats_blank_as_missing() {
        let missing = TASKS.missing_required(&form(json!({
            "title": "   ",
            "dueDate": "2025-03-01",
            "assignedTo": null
        })));
        assert_eq!(missing, vec!["title".to_string(), "assignedTo".to_string()]);
    }

    #[test]
    fn zero_value_counts_as_missing_for_required_numbers() {
        let deal = |value: Value| {
            form(json!({
                "name": "Lab refit",
                "clientName": "Acme",
                "value": value,
                "status": "pending",
                "priority": "low",
                "category": "Facilities"
            }))
        };
        assert_eq!(DEALS.missing_required(&deal(json!(0))), vec!["value".to_string()]);
        assert_eq!(DEALS.missing_required(&deal(json!(0.0))), vec!["value".to_string()]);
        assert!(DEALS.missing_required(&deal(json!(1500))).is_empty());
        assert!(DEALS.missing_required(&deal(json!("0"))).is_empty());
    }

    #[test]
    fn prefixes_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_prefix(kind.prefix()), Some(kind));
            assert_eq!(kind.schema().kind, kind);
        }
        assert_eq!(EntityKind::from_prefix("grades"), None);
    }
}
