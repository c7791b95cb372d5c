//! DDL statement building.
//!
//! Identifiers are always quoted for the target dialect. Free-form SQL
//! fragments (data types, default expressions) are run through sqlparser
//! first and rejected unless they parse as exactly one fragment of the
//! expected kind, so they cannot smuggle in a second statement. Comments
//! are rejected too: the tokenizer skips them, but spliced into a statement
//! they would hide whatever follows.

use crate::db::schema::schema_or_default;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use crate::tools::operation::{AlterChange, ColumnSpec, CreateEnumParams, CreateTableParams};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Quote an identifier, doubling any embedded quote character.
pub fn quote_identifier(db_type: DatabaseType, name: &str) -> String {
    match db_type {
        DatabaseType::MySQL => format!("`{}`", name.replace('`', "``")),
        DatabaseType::PostgreSQL | DatabaseType::SQLite => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }
}

/// Single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `schema.name`, quoted. SQLite has one implicit schema, so it is omitted.
pub fn qualified_name(db_type: DatabaseType, schema: Option<&str>, name: &str) -> String {
    let schema = match db_type {
        DatabaseType::SQLite => "",
        _ => schema_or_default(db_type, schema),
    };
    if schema.is_empty() {
        quote_identifier(db_type, name)
    } else {
        format!(
            "{}.{}",
            quote_identifier(db_type, schema),
            quote_identifier(db_type, name)
        )
    }
}

pub fn validate_data_type(db_type: DatabaseType, data_type: &str) -> DbResult<()> {
    let dialect = get_dialect(db_type);
    parse_whole(dialect.as_ref(), data_type, |parser| {
        parser.parse_data_type().map(|_| ())
    })
    .map_err(|e| {
        DbError::invalid_input(format!(
            "Invalid {} data type '{}': {}",
            db_type, data_type, e
        ))
    })
}

pub fn validate_default_expr(db_type: DatabaseType, expr: &str) -> DbResult<()> {
    let dialect = get_dialect(db_type);
    parse_whole(dialect.as_ref(), expr, |parser| parser.parse_expr().map(|_| ())).map_err(|e| {
        DbError::invalid_input(format!("Invalid default expression '{}': {}", expr, e))
    })
}

fn parse_whole(
    dialect: &dyn Dialect,
    sql: &str,
    parse: impl FnOnce(&mut Parser<'_>) -> Result<(), ParserError>,
) -> Result<(), ParserError> {
    let tokens = Tokenizer::new(dialect, sql).tokenize()?;
    let has_comment = tokens.iter().any(|token| {
        matches!(
            token,
            Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_))
        )
    });
    if has_comment {
        return Err(ParserError::ParserError(
            "comments are not allowed".to_string(),
        ));
    }

    let mut parser = Parser::new(dialect).with_tokens(tokens);
    parse(&mut parser)?;
    parser.expect_token(&Token::EOF)?;
    Ok(())
}

fn column_definition(db_type: DatabaseType, column: &ColumnSpec) -> DbResult<String> {
    validate_data_type(db_type, &column.data_type)?;

    let mut sql = format!(
        "{} {}",
        quote_identifier(db_type, &column.name),
        column.data_type.trim()
    );
    if !column.nullable || column.primary_key {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        validate_default_expr(db_type, default)?;
        sql.push_str(" DEFAULT ");
        sql.push_str(default.trim());
    }
    Ok(sql)
}

/// One `CREATE TABLE` statement. Primary key columns become a table
/// constraint in declaration order.
pub fn create_table_sql(db_type: DatabaseType, params: &CreateTableParams) -> DbResult<String> {
    let mut parts = params
        .columns
        .iter()
        .map(|column| column_definition(db_type, column))
        .collect::<DbResult<Vec<_>>>()?;

    let primary_key: Vec<String> = params
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_identifier(db_type, &c.name))
        .collect();
    if !primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {}{} (\n    {}\n)",
        if params.if_not_exists {
            "IF NOT EXISTS "
        } else {
            ""
        },
        qualified_name(db_type, params.schema.as_deref(), &params.table_name),
        parts.join(",\n    ")
    ))
}

/// One `ALTER TABLE` statement for one change.
///
/// `table` must already be qualified and quoted.
pub fn alter_table_sql(db_type: DatabaseType, table: &str, change: &AlterChange) -> DbResult<String> {
    let column = quote_identifier(db_type, change.column_name());

    let action = match change {
        AlterChange::Add {
            column_name,
            data_type,
            nullable,
            default,
        } => {
            let definition = column_definition(
                db_type,
                &ColumnSpec {
                    name: column_name.clone(),
                    data_type: data_type.clone(),
                    nullable: *nullable,
                    default: default.clone(),
                    primary_key: false,
                },
            )?;
            format!("ADD COLUMN {}", definition)
        }
        AlterChange::Drop { cascade, .. } => match (db_type, cascade) {
            (DatabaseType::PostgreSQL, true) => format!("DROP COLUMN {} CASCADE", column),
            (_, true) => {
                return Err(DbError::invalid_input(format!(
                    "cascade is not supported when dropping columns on {}",
                    db_type
                )));
            }
            (_, false) => format!("DROP COLUMN {}", column),
        },
        AlterChange::Alter {
            data_type,
            nullable,
            default,
            drop_default,
            ..
        } => alter_column_clause(
            db_type,
            &column,
            data_type.as_deref(),
            *nullable,
            default.as_deref(),
            *drop_default,
        )?,
    };

    Ok(format!("ALTER TABLE {} {}", table, action))
}

fn alter_column_clause(
    db_type: DatabaseType,
    column: &str,
    data_type: Option<&str>,
    nullable: Option<bool>,
    default: Option<&str>,
    drop_default: bool,
) -> DbResult<String> {
    if let Some(data_type) = data_type {
        validate_data_type(db_type, data_type)?;
    }
    if let Some(default) = default {
        validate_default_expr(db_type, default)?;
    }

    match db_type {
        DatabaseType::PostgreSQL => {
            let mut clauses = Vec::new();
            if let Some(data_type) = data_type {
                clauses.push(format!("ALTER COLUMN {} TYPE {}", column, data_type.trim()));
            }
            match nullable {
                Some(true) => clauses.push(format!("ALTER COLUMN {} DROP NOT NULL", column)),
                Some(false) => clauses.push(format!("ALTER COLUMN {} SET NOT NULL", column)),
                None => {}
            }
            if let Some(default) = default {
                clauses.push(format!("ALTER COLUMN {} SET DEFAULT {}", column, default.trim()));
            } else if drop_default {
                clauses.push(format!("ALTER COLUMN {} DROP DEFAULT", column));
            }
            Ok(clauses.join(", "))
        }
        DatabaseType::MySQL => match data_type {
            // MODIFY restates the whole column: whatever is left out is
            // cleared, so nullability and the default must both be given.
            Some(data_type) => {
                let Some(nullable) = nullable else {
                    return Err(DbError::invalid_input(
                        "MySQL rewrites the whole column when data_type changes; pass nullable as well",
                    ));
                };
                if default.is_none() && !drop_default {
                    return Err(DbError::invalid_input(
                        "MySQL rewrites the whole column when data_type changes; pass default, or drop_default to leave it without one",
                    ));
                }

                let mut clause = format!(
                    "MODIFY COLUMN {} {} {}",
                    column,
                    data_type.trim(),
                    if nullable { "NULL" } else { "NOT NULL" }
                );
                if let Some(default) = default {
                    clause.push_str(" DEFAULT ");
                    clause.push_str(default.trim());
                }
                Ok(clause)
            }
            None if nullable.is_some() => Err(DbError::invalid_input(
                "MySQL needs data_type to change a column's nullability",
            )),
            None => match default {
                Some(default) => Ok(format!(
                    "ALTER COLUMN {} SET DEFAULT {}",
                    column,
                    default.trim()
                )),
                None => Ok(format!("ALTER COLUMN {} DROP DEFAULT", column)),
            },
        },
        DatabaseType::SQLite => Err(DbError::invalid_input(
            "SQLite cannot alter existing columns; only add and drop are supported",
        )),
    }
}

/// `CREATE TYPE ... AS ENUM`. PostgreSQL only.
pub fn create_enum_sql(params: &CreateEnumParams) -> String {
    let labels: Vec<String> = params.values.iter().map(|v| quote_literal(v)).collect();
    format!(
        "CREATE TYPE {} AS ENUM ({})",
        qualified_name(
            DatabaseType::PostgreSQL,
            params.schema.as_deref(),
            &params.enum_name
        ),
        labels.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(
            quote_identifier(DatabaseType::PostgreSQL, "we\"ird"),
            "\"we\"\"ird\""
        );
        assert_eq!(quote_identifier(DatabaseType::MySQL, "a`b"), "`a``b`");
        assert_eq!(quote_identifier(DatabaseType::SQLite, "users"), "\"users\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_qualified_name_per_dialect() {
        assert_eq!(
            qualified_name(DatabaseType::PostgreSQL, None, "users"),
            "\"public\".\"users\""
        );
        assert_eq!(
            qualified_name(DatabaseType::MySQL, Some("shop"), "users"),
            "`shop`.`users`"
        );
        assert_eq!(qualified_name(DatabaseType::MySQL, None, "users"), "`users`");
        assert_eq!(
            qualified_name(DatabaseType::SQLite, Some("main"), "users"),
            "\"users\""
        );
    }

    #[test]
    fn test_validate_data_type() {
        assert!(validate_data_type(DatabaseType::PostgreSQL, "varchar(255)").is_ok());
        assert!(validate_data_type(DatabaseType::PostgreSQL, "timestamp with time zone").is_ok());
        assert!(validate_data_type(DatabaseType::MySQL, "int unsigned").is_ok());
        assert!(validate_data_type(DatabaseType::SQLite, "INTEGER").is_ok());

        let err = validate_data_type(DatabaseType::PostgreSQL, "int; DROP TABLE users").unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_validate_rejects_comments() {
        for fragment in ["bigint --", "bigint /* x */", "int -- ; DROP TABLE users"] {
            let err = validate_data_type(DatabaseType::PostgreSQL, fragment).unwrap_err();
            assert!(err.to_string().contains("comments are not allowed"), "{fragment}");
        }
        assert!(validate_data_type(DatabaseType::MySQL, "bigint # trailing").is_err());
        assert!(validate_default_expr(DatabaseType::SQLite, "0 -- zero").is_err());
        // Comment markers inside a literal are just text
        assert!(validate_default_expr(DatabaseType::PostgreSQL, "'a -- b'").is_ok());
    }

    #[test]
    fn test_commented_type_cannot_hide_later_clauses() {
        let change = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint --".to_string()),
            nullable: Some(false),
            default: None,
            drop_default: false,
        };
        let err = alter_table_sql(DatabaseType::PostgreSQL, "\"t\"", &change).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_validate_default_expr() {
        assert!(validate_default_expr(DatabaseType::PostgreSQL, "now()").is_ok());
        assert!(validate_default_expr(DatabaseType::PostgreSQL, "'active'").is_ok());
        assert!(validate_default_expr(DatabaseType::MySQL, "0").is_ok());
        assert!(validate_default_expr(DatabaseType::SQLite, "1); DROP TABLE x; --").is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let params = CreateTableParams {
            table_name: "users".to_string(),
            schema: None,
            columns: vec![
                ColumnSpec {
                    primary_key: true,
                    ..column("id", "integer")
                },
                ColumnSpec {
                    nullable: false,
                    default: Some("'anon'".to_string()),
                    ..column("name", "text")
                },
            ],
            if_not_exists: true,
        };

        let sql = create_table_sql(DatabaseType::PostgreSQL, &params).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"users\" (\n    \"id\" integer NOT NULL,\n    \"name\" text NOT NULL DEFAULT 'anon',\n    PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn test_create_table_rejects_bad_type() {
        let params = CreateTableParams {
            table_name: "t".to_string(),
            schema: None,
            columns: vec![column("a", "text) ; DROP TABLE t; --")],
            if_not_exists: false,
        };
        assert!(create_table_sql(DatabaseType::SQLite, &params).is_err());
    }

    #[test]
    fn test_alter_add_and_drop() {
        let add = AlterChange::Add {
            column_name: "email".to_string(),
            data_type: "text".to_string(),
            nullable: false,
            default: Some("''".to_string()),
        };
        assert_eq!(
            alter_table_sql(DatabaseType::SQLite, "\"users\"", &add).unwrap(),
            "ALTER TABLE \"users\" ADD COLUMN \"email\" text NOT NULL DEFAULT ''"
        );

        let drop = AlterChange::Drop {
            column_name: "legacy".to_string(),
            cascade: true,
        };
        assert_eq!(
            alter_table_sql(DatabaseType::PostgreSQL, "\"public\".\"users\"", &drop).unwrap(),
            "ALTER TABLE \"public\".\"users\" DROP COLUMN \"legacy\" CASCADE"
        );
        assert!(alter_table_sql(DatabaseType::MySQL, "`users`", &drop).is_err());
    }

    #[test]
    fn test_alter_column_postgres_combines_clauses() {
        let change = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint".to_string()),
            nullable: Some(false),
            default: None,
            drop_default: true,
        };
        assert_eq!(
            alter_table_sql(DatabaseType::PostgreSQL, "\"t\"", &change).unwrap(),
            "ALTER TABLE \"t\" ALTER COLUMN \"age\" TYPE bigint, ALTER COLUMN \"age\" SET NOT NULL, ALTER COLUMN \"age\" DROP DEFAULT"
        );
    }

    #[test]
    fn test_alter_column_mysql() {
        let modify = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint".to_string()),
            nullable: Some(true),
            default: Some("0".to_string()),
            drop_default: false,
        };
        assert_eq!(
            alter_table_sql(DatabaseType::MySQL, "`t`", &modify).unwrap(),
            "ALTER TABLE `t` MODIFY COLUMN `age` bigint NULL DEFAULT 0"
        );

        let without_default = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint".to_string()),
            nullable: Some(false),
            default: None,
            drop_default: true,
        };
        assert_eq!(
            alter_table_sql(DatabaseType::MySQL, "`t`", &without_default).unwrap(),
            "ALTER TABLE `t` MODIFY COLUMN `age` bigint NOT NULL"
        );

        let nullability_only = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: None,
            nullable: Some(false),
            default: None,
            drop_default: false,
        };
        assert!(alter_table_sql(DatabaseType::MySQL, "`t`", &nullability_only).is_err());
    }

    #[test]
    fn test_mysql_type_change_must_restate_the_column() {
        let type_only = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint".to_string()),
            nullable: None,
            default: None,
            drop_default: false,
        };
        let err = alter_table_sql(DatabaseType::MySQL, "`t`", &type_only).unwrap_err();
        assert!(err.to_string().contains("pass nullable"));

        let no_default_decision = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: Some("bigint".to_string()),
            nullable: Some(false),
            default: None,
            drop_default: false,
        };
        let err = alter_table_sql(DatabaseType::MySQL, "`t`", &no_default_decision).unwrap_err();
        assert!(err.to_string().contains("drop_default"));

        // PostgreSQL changes only the type and keeps the rest
        assert_eq!(
            alter_table_sql(DatabaseType::PostgreSQL, "\"t\"", &type_only).unwrap(),
            "ALTER TABLE \"t\" ALTER COLUMN \"age\" TYPE bigint"
        );
    }

    #[test]
    fn test_alter_column_unsupported_on_sqlite() {
        let change = AlterChange::Alter {
            column_name: "age".to_string(),
            data_type: None,
            nullable: None,
            default: None,
            drop_default: true,
        };
        let err = alter_table_sql(DatabaseType::SQLite, "\"t\"", &change).unwrap_err();
        assert!(err.to_string().contains("SQLite"));
    }

    #[test]
    fn test_create_enum_sql() {
        let params = CreateEnumParams {
            enum_name: "mood".to_string(),
            values: vec!["happy".to_string(), "it's ok".to_string()],
            schema: Some("app".to_string()),
            if_not_exists: false,
        };
        assert_eq!(
            create_enum_sql(&params),
            "CREATE TYPE \"app\".\"mood\" AS ENUM ('happy', 'it''s ok')"
        );
    }
}
