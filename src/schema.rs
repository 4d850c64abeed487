//! Static description of the normalized schema.
//!
//! Every table the mapping reads or writes is declared here with its id
//! column, its ordered column list and the `next_id` column that allocates
//! its ids. [`verify`] checks the declarations once against a live database
//! and reports everything that is missing in a single error.
use std::fmt;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{Result, SpineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Commit,
    Alternative,
    Scenario,
    ScenarioAlternative,
    EntityClass,
    RelationshipEntityClass,
    Entity,
    RelationshipEntity,
    EntityGroup,
    ParameterDefinition,
    ParameterValue,
    ParameterValueList,
    ParameterTag,
    ParameterDefinitionTag,
    Tool,
    Feature,
    ToolFeature,
    ToolFeatureMethod,
}

impl Table {
    pub const ALL: [Table; 18] = [
        Table::Commit,
        Table::Alternative,
        Table::Scenario,
        Table::ScenarioAlternative,
        Table::EntityClass,
        Table::RelationshipEntityClass,
        Table::Entity,
        Table::RelationshipEntity,
        Table::EntityGroup,
        Table::ParameterDefinition,
        Table::ParameterValue,
        Table::ParameterValueList,
        Table::ParameterTag,
        Table::ParameterDefinitionTag,
        Table::Tool,
        Table::Feature,
        Table::ToolFeature,
        Table::ToolFeatureMethod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Commit => "commit",
            Table::Alternative => "alternative",
            Table::Scenario => "scenario",
            Table::ScenarioAlternative => "scenario_alternative",
            Table::EntityClass => "entity_class",
            Table::RelationshipEntityClass => "relationship_entity_class",
            Table::Entity => "entity",
            Table::RelationshipEntity => "relationship_entity",
            Table::EntityGroup => "entity_group",
            Table::ParameterDefinition => "parameter_definition",
            Table::ParameterValue => "parameter_value",
            Table::ParameterValueList => "parameter_value_list",
            Table::ParameterTag => "parameter_tag",
            Table::ParameterDefinitionTag => "parameter_definition_tag",
            Table::Tool => "tool",
            Table::Feature => "feature",
            Table::ToolFeature => "tool_feature",
            Table::ToolFeatureMethod => "tool_feature_method",
        }
    }

    /// The column staging tracks rows by. Member tables and value lists
    /// hold several rows per id.
    pub fn id_column(self) -> &'static str {
        match self {
            Table::RelationshipEntityClass => "entity_class_id",
            Table::RelationshipEntity => "entity_id",
            _ => "id",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Commit => &["id", "comment", "date", "user"],
            Table::Alternative => &["id", "name", "description", "commit_id"],
            Table::Scenario => &["id", "name", "description", "active", "commit_id"],
            Table::ScenarioAlternative => {
                &["id", "scenario_id", "alternative_id", "rank", "commit_id"]
            }
            Table::EntityClass => &[
                "id",
                "type_id",
                "name",
                "description",
                "display_order",
                "hidden",
                "commit_id",
            ],
            Table::RelationshipEntityClass => &["entity_class_id", "dimension", "member_class_id"],
            Table::Entity => &["id", "type_id", "class_id", "name", "description", "commit_id"],
            Table::RelationshipEntity => &[
                "entity_id",
                "entity_class_id",
                "dimension",
                "member_id",
                "member_class_id",
            ],
            Table::EntityGroup => &["id", "entity_class_id", "entity_id", "member_id", "commit_id"],
            Table::ParameterDefinition => &[
                "id",
                "entity_class_id",
                "name",
                "description",
                "default_value",
                "default_type",
                "parameter_value_list_id",
                "commit_id",
            ],
            Table::ParameterValue => &[
                "id",
                "parameter_definition_id",
                "entity_class_id",
                "entity_id",
                "alternative_id",
                "value",
                "type",
                "commit_id",
            ],
            Table::ParameterValueList => &["id", "name", "value_index", "value", "commit_id"],
            Table::ParameterTag => &["id", "tag", "description", "commit_id"],
            Table::ParameterDefinitionTag => {
                &["id", "parameter_definition_id", "parameter_tag_id", "commit_id"]
            }
            Table::Tool => &["id", "name", "description", "commit_id"],
            Table::Feature => &[
                "id",
                "parameter_definition_id",
                "parameter_value_list_id",
                "description",
                "commit_id",
            ],
            Table::ToolFeature => &[
                "id",
                "tool_id",
                "feature_id",
                "parameter_value_list_id",
                "required",
                "commit_id",
            ],
            Table::ToolFeatureMethod => &[
                "id",
                "tool_feature_id",
                "parameter_value_list_id",
                "method_index",
                "commit_id",
            ],
        }
    }

    /// The `next_id` column holding the allocation watermark for this table.
    /// Member rows reuse the id of the class or entity that owns them.
    pub fn next_id_column(self) -> Option<&'static str> {
        match self {
            Table::RelationshipEntityClass | Table::RelationshipEntity => None,
            Table::Commit => Some("commit_id"),
            Table::Alternative => Some("alternative_id"),
            Table::Scenario => Some("scenario_id"),
            Table::ScenarioAlternative => Some("scenario_alternative_id"),
            Table::EntityClass => Some("entity_class_id"),
            Table::Entity => Some("entity_id"),
            Table::EntityGroup => Some("entity_group_id"),
            Table::ParameterDefinition => Some("parameter_definition_id"),
            Table::ParameterValue => Some("parameter_value_id"),
            Table::ParameterValueList => Some("parameter_value_list_id"),
            Table::ParameterTag => Some("parameter_tag_id"),
            Table::ParameterDefinitionTag => Some("parameter_definition_tag_id"),
            Table::Tool => Some("tool_id"),
            Table::Feature => Some("feature_id"),
            Table::ToolFeature => Some("tool_feature_id"),
            Table::ToolFeatureMethod => Some("tool_feature_method_id"),
        }
    }

    /// Fully qualified name of the original table.
    pub fn original(self) -> String {
        format!("main.{}", quoted(self.name()))
    }

    /// Fully qualified name of the connection-private shadow table.
    pub fn shadow(self) -> String {
        format!("temp.{}", quoted(&format!("diff_{}", self.name())))
    }

    pub fn column_list(self) -> String {
        self.columns().join(", ")
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const NEXT_ID: &str = "next_id";

pub fn next_id_columns() -> Vec<&'static str> {
    let mut columns = vec!["user", "date"];
    columns.extend(Table::ALL.iter().filter_map(|t| t.next_id_column()));
    columns
}

pub(crate) fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn live_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("select name from pragma_table_info(?1, 'main')")?;
    let columns = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Checks every declared table and column against the live schema.
pub fn verify(conn: &Connection) -> Result<()> {
    let mut declared: Vec<(&str, Vec<&str>)> = Table::ALL
        .iter()
        .map(|t| (t.name(), t.columns().to_vec()))
        .collect();
    declared.push((NEXT_ID, next_id_columns()));

    let mut missing_tables = Vec::new();
    let mut missing_columns = Vec::new();
    for (table, columns) in declared {
        let live = live_columns(conn, table)?;
        if live.is_empty() {
            missing_tables.push(table.to_string());
            continue;
        }
        for column in columns {
            if !live.iter().any(|c| c == column) {
                missing_columns.push(format!("{table}.{column}"));
            }
        }
    }
    if missing_tables.is_empty() && missing_columns.is_empty() {
        Ok(())
    } else {
        Err(SpineError::SchemaMissing {
            tables: missing_tables,
            columns: missing_columns,
        })
    }
}

/// Creates the schema in a fresh database, along with the initial commit and
/// the `Base` alternative. Existing tables and rows are left alone.
pub fn create_new_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        create table if not exists \"commit\" (
            id integer not null,
            comment text not null default '',
            date text not null,
            user text,
            constraint pk_commit primary key (id)
        );
        create table if not exists alternative (
            id integer not null,
            name text not null,
            description text,
            commit_id integer,
            constraint pk_alternative primary key (id),
            constraint unique_alternative_name unique (name)
        );
        create table if not exists scenario (
            id integer not null,
            name text not null,
            description text,
            active integer not null default 0,
            commit_id integer,
            constraint pk_scenario primary key (id),
            constraint unique_scenario_name unique (name)
        );
        create table if not exists scenario_alternative (
            id integer not null,
            scenario_id integer not null,
            alternative_id integer not null,
            rank integer not null,
            commit_id integer,
            constraint pk_scenario_alternative primary key (id),
            constraint unique_scenario_alternative unique (scenario_id, alternative_id),
            constraint unique_scenario_rank unique (scenario_id, rank)
        );
        create table if not exists entity_class (
            id integer not null,
            type_id integer not null,
            name text not null,
            description text,
            display_order integer not null default 99,
            hidden integer not null default 0,
            commit_id integer,
            constraint pk_entity_class primary key (id),
            constraint unique_entity_class_name unique (name),
            constraint known_entity_class_type check (type_id in (1, 2))
        );
        create table if not exists relationship_entity_class (
            entity_class_id integer not null,
            dimension integer not null,
            member_class_id integer not null,
            constraint pk_relationship_entity_class primary key (entity_class_id, dimension)
        );
        create table if not exists entity (
            id integer not null,
            type_id integer not null,
            class_id integer not null,
            name text not null,
            description text,
            commit_id integer,
            constraint pk_entity primary key (id),
            constraint unique_entity_name unique (class_id, name),
            constraint known_entity_type check (type_id in (1, 2))
        );
        create table if not exists relationship_entity (
            entity_id integer not null,
            entity_class_id integer not null,
            dimension integer not null,
            member_id integer not null,
            member_class_id integer not null,
            constraint pk_relationship_entity primary key (entity_id, dimension)
        );
        create table if not exists entity_group (
            id integer not null,
            entity_class_id integer not null,
            entity_id integer not null,
            member_id integer not null,
            commit_id integer,
            constraint pk_entity_group primary key (id),
            constraint unique_entity_group_member unique (entity_id, member_id)
        );
        create table if not exists parameter_definition (
            id integer not null,
            entity_class_id integer not null,
            name text not null,
            description text,
            default_value blob,
            default_type text,
            parameter_value_list_id integer,
            commit_id integer,
            constraint pk_parameter_definition primary key (id),
            constraint unique_parameter_definition_name unique (entity_class_id, name)
        );
        create table if not exists parameter_value (
            id integer not null,
            parameter_definition_id integer not null,
            entity_class_id integer not null,
            entity_id integer not null,
            alternative_id integer not null,
            value blob not null,
            type text,
            commit_id integer,
            constraint pk_parameter_value primary key (id),
            constraint unique_parameter_value unique (entity_id, parameter_definition_id, alternative_id)
        );
        create table if not exists parameter_value_list (
            id integer not null,
            name text not null,
            value_index integer not null,
            value blob not null,
            commit_id integer,
            constraint pk_parameter_value_list primary key (id, value_index)
        );
        create table if not exists parameter_tag (
            id integer not null,
            tag text not null,
            description text,
            commit_id integer,
            constraint pk_parameter_tag primary key (id),
            constraint unique_parameter_tag unique (tag)
        );
        create table if not exists parameter_definition_tag (
            id integer not null,
            parameter_definition_id integer not null,
            parameter_tag_id integer not null,
            commit_id integer,
            constraint pk_parameter_definition_tag primary key (id),
            constraint unique_parameter_definition_tag unique (parameter_definition_id, parameter_tag_id)
        );
        create table if not exists tool (
            id integer not null,
            name text not null,
            description text,
            commit_id integer,
            constraint pk_tool primary key (id),
            constraint unique_tool_name unique (name)
        );
        create table if not exists feature (
            id integer not null,
            parameter_definition_id integer not null,
            parameter_value_list_id integer not null,
            description text,
            commit_id integer,
            constraint pk_feature primary key (id),
            constraint unique_feature_definition unique (parameter_definition_id)
        );
        create table if not exists tool_feature (
            id integer not null,
            tool_id integer not null,
            feature_id integer not null,
            parameter_value_list_id integer not null,
            required integer not null default 0,
            commit_id integer,
            constraint pk_tool_feature primary key (id),
            constraint unique_tool_feature unique (tool_id, feature_id)
        );
        create table if not exists tool_feature_method (
            id integer not null,
            tool_feature_id integer not null,
            parameter_value_list_id integer not null,
            method_index integer not null,
            commit_id integer,
            constraint pk_tool_feature_method primary key (id),
            constraint unique_tool_feature_method unique (tool_feature_id, method_index)
        );
        create table if not exists next_id (
            user text,
            date text,
            commit_id integer,
            alternative_id integer,
            scenario_id integer,
            scenario_alternative_id integer,
            entity_class_id integer,
            entity_id integer,
            entity_group_id integer,
            parameter_definition_id integer,
            parameter_value_id integer,
            parameter_value_list_id integer,
            parameter_tag_id integer,
            parameter_definition_tag_id integer,
            tool_id integer,
            feature_id integer,
            tool_feature_id integer,
            tool_feature_method_id integer
        );
        ",
    )?;
    conn.execute(
        "insert or ignore into \"commit\" (id, comment, date, user) values (1, 'Create the database', ?1, 'anon')",
        params![Utc::now()],
    )?;
    conn.execute(
        "insert or ignore into alternative (id, name, description, commit_id) values (1, ?1, 'Base alternative', 1)",
        params![BASE_ALTERNATIVE],
    )?;
    Ok(())
}

/// Name of the alternative every database starts with.
pub const BASE_ALTERNATIVE: &str = "Base";
