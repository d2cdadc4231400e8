use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::AppPaths;

use super::database::{ChallengeDef, DefDatabase, DropDef, EnemyDef, ItemDef, PlayerDef};
use super::discovery::{collect_xml_files, discover_mod_sources};
use super::hashing::ContentFingerprint;
use super::types::{ContentLoadError, ContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
    UnresolvedReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum DefKind {
    Player,
    Enemy,
    Item,
    Challenge,
}

impl DefKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PlayerDef" => Some(Self::Player),
            "EnemyDef" => Some(Self::Enemy),
            "ItemDef" => Some(Self::Item),
            "ChallengeDef" => Some(Self::Challenge),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Player => "PlayerDef",
            Self::Enemy => "EnemyDef",
            Self::Item => "ItemDef",
            Self::Challenge => "ChallengeDef",
        }
    }
}

#[derive(Debug, Clone)]
enum ParsedDef {
    Player(PlayerDef),
    Enemy(EnemyDef),
    Item(ItemDef),
    Challenge(ChallengeDef),
}

impl ParsedDef {
    fn kind(&self) -> DefKind {
        match self {
            Self::Player(_) => DefKind::Player,
            Self::Enemy(_) => DefKind::Enemy,
            Self::Item(_) => DefKind::Item,
            Self::Challenge(_) => DefKind::Challenge,
        }
    }

    fn def_name(&self) -> &str {
        match self {
            Self::Player(def) => &def.def_name,
            Self::Enemy(def) => &def.def_name,
            Self::Item(def) => &def.def_name,
            Self::Challenge(def) => &def.def_name,
        }
    }
}

/// Where a def was declared, kept so cross-def validation can point at it.
#[derive(Debug, Clone)]
struct DefOrigin {
    mod_id: String,
    file_path: PathBuf,
    location: Option<SourceLocation>,
}

#[derive(Debug, Clone)]
struct LocatedDef {
    def: ParsedDef,
    origin: DefOrigin,
}

/// Loads every `<Defs>` document from base content and the enabled mods.
///
/// Within one mod a defName may appear once per def type. Across mods the
/// later mod replaces the earlier definition.
pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut fingerprint = ContentFingerprint::default();
    let mut merged = BTreeMap::<(DefKind, String), LocatedDef>::new();

    for source in &sources {
        let xml_files = collect_xml_files(&source.source_dir)
            .map_err(|error| map_discovery_error(error, &source.source_dir))?;
        let mut seen_in_mod = HashSet::<(DefKind, String)>::new();

        for xml_file in xml_files {
            let bytes = fs::read(&xml_file.abs_path).map_err(|error| {
                read_error(
                    &source.mod_id,
                    xml_file.abs_path.clone(),
                    format!("failed to read XML file: {error}"),
                )
            })?;
            fingerprint.update(&source.mod_id, &xml_file.rel_path, &bytes);
            let raw = String::from_utf8(bytes).map_err(|_| {
                read_error(
                    &source.mod_id,
                    xml_file.abs_path.clone(),
                    "XML file is not valid UTF-8".to_string(),
                )
            })?;

            let defs = parse_defs_document(&source.mod_id, &xml_file.abs_path, &raw)?;
            debug!(
                mod_id = %source.mod_id,
                file = %xml_file.rel_path,
                defs = defs.len(),
                "content_file_parsed"
            );
            for located in defs {
                let key = (located.def.kind(), located.def.def_name().to_string());
                if !seen_in_mod.insert(key.clone()) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
                            key.0.tag(),
                            key.1,
                            source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: located.origin.file_path,
                        location: located.origin.location,
                    });
                }
                merged.insert(key, located);
            }
        }
    }

    validate_references(&merged)?;

    let file_count = fingerprint.file_count();
    let mut builder = DefDatabase::builder();
    for located in merged.into_values() {
        builder = match located.def {
            ParsedDef::Player(def) => builder.player(def),
            ParsedDef::Enemy(def) => builder.enemy(def),
            ParsedDef::Item(def) => builder.item(def),
            ParsedDef::Challenge(def) => builder.challenge(def),
        };
    }
    let database = builder.fingerprint(fingerprint.finish()).build();

    info!(
        mods = sources.len(),
        xml_files = file_count,
        players = database.player_defs().count(),
        enemies = database.enemy_defs().count(),
        items = database.item_defs().count(),
        challenges = database.challenge_defs().count(),
        fingerprint = %database.fingerprint(),
        "content_loaded"
    );
    Ok(database)
}

fn validate_references(
    merged: &BTreeMap<(DefKind, String), LocatedDef>,
) -> Result<(), ContentCompileError> {
    let exists = |kind: DefKind, name: &str| merged.contains_key(&(kind, name.to_string()));

    for located in merged.values() {
        let unresolved = match &located.def {
            ParsedDef::Enemy(def) => def
                .drops
                .iter()
                .find(|drop| !exists(DefKind::Item, &drop.item))
                .map(|drop| (DefKind::Item, drop.item.as_str())),
            ParsedDef::Challenge(def) => def
                .enemies
                .iter()
                .find(|enemy| !exists(DefKind::Enemy, enemy))
                .map(|enemy| (DefKind::Enemy, enemy.as_str())),
            ParsedDef::Player(_) | ParsedDef::Item(_) => None,
        };
        if let Some((kind, name)) = unresolved {
            return Err(ContentCompileError {
                code: ContentErrorCode::UnresolvedReference,
                message: format!(
                    "{} '{}' references unknown {} '{}'",
                    located.def.kind().tag(),
                    located.def.def_name(),
                    kind.tag(),
                    name
                ),
                mod_id: located.origin.mod_id.clone(),
                file_path: located.origin.file_path.clone(),
                location: located.origin.location,
            });
        }
    }
    Ok(())
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<LocatedDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseCtx {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::<LocatedDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        let tag = child.tag_name().name();
        let Some(kind) = DefKind::from_tag(tag) else {
            return Err(ctx.error_at(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{tag}>; expected PlayerDef, EnemyDef, ItemDef or ChallengeDef"
                ),
                child,
            ));
        };
        let def = match kind {
            DefKind::Player => ParsedDef::Player(parse_player_def(&ctx, child)?),
            DefKind::Enemy => ParsedDef::Enemy(parse_enemy_def(&ctx, child)?),
            DefKind::Item => ParsedDef::Item(parse_item_def(&ctx, child)?),
            DefKind::Challenge => ParsedDef::Challenge(parse_challenge_def(&ctx, child)?),
        };
        defs.push(LocatedDef {
            def,
            origin: DefOrigin {
                mod_id: mod_id.to_string(),
                file_path: file_path.to_path_buf(),
                location: Some(ctx.location_of(child)),
            },
        });
    }

    Ok(defs)
}

fn parse_player_def(ctx: &ParseCtx<'_, '_>, node: Node<'_, '_>) -> Result<PlayerDef, ContentCompileError> {
    let fields = ctx.unique_fields(node, "PlayerDef")?;
    let mut def = PlayerDef::with_name(ctx.def_name(node, &fields, "PlayerDef")?);

    for field in fields {
        match field.tag_name().name() {
            "defName" => {}
            "maxHealth" => def.max_health = ctx.positive_count(field)?,
            "moveSpeed" => def.move_speed = ctx.non_negative(field)?,
            "damage" => def.damage = ctx.number(field)?,
            "attackRange" => def.attack_range = ctx.non_negative(field)?,
            "knockback" => def.knockback = ctx.non_negative(field)?,
            "attackCooldown" => def.attack_cooldown = ctx.non_negative(field)?,
            "rechargeDelay" => def.recharge_delay = ctx.non_negative(field)?,
            "maxAttackPoints" => def.max_attack_points = ctx.number(field)?,
            other => return Err(ctx.unknown_field(field, other, "PlayerDef")),
        }
    }
    Ok(def)
}

fn parse_enemy_def(ctx: &ParseCtx<'_, '_>, node: Node<'_, '_>) -> Result<EnemyDef, ContentCompileError> {
    let fields = ctx.unique_fields(node, "EnemyDef")?;
    let mut def = EnemyDef::with_name(ctx.def_name(node, &fields, "EnemyDef")?);

    for field in fields {
        match field.tag_name().name() {
            "defName" => {}
            "label" => def.label = ctx.text(field)?,
            "maxHealth" => def.max_health = ctx.positive_count(field)?,
            "moveSpeed" => def.move_speed = ctx.non_negative(field)?,
            "damage" => def.damage = ctx.number(field)?,
            "knockback" => def.knockback = ctx.non_negative(field)?,
            "attackRange" => def.attack_range = ctx.non_negative(field)?,
            "detectionRange" => def.detection_range = ctx.non_negative(field)?,
            "returnRange" => def.return_range = ctx.non_negative(field)?,
            "attackCooldown" => def.attack_cooldown = ctx.non_negative(field)?,
            "telegraphDuration" => def.telegraph_duration = ctx.non_negative(field)?,
            "repathInterval" => def.repath_interval = ctx.non_negative(field)?,
            "waypointThreshold" => def.waypoint_threshold = ctx.non_negative(field)?,
            "despawnDelay" => def.despawn_delay = ctx.non_negative(field)?,
            "dropForce" => def.drop_force = ctx.non_negative(field)?,
            "drops" => {
                def.drops = ctx
                    .list_items(field)?
                    .into_iter()
                    .map(|li| parse_drop(ctx, li))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            other => return Err(ctx.unknown_field(field, other, "EnemyDef")),
        }
    }
    Ok(def)
}

fn parse_drop(ctx: &ParseCtx<'_, '_>, li: Node<'_, '_>) -> Result<DropDef, ContentCompileError> {
    let fields = ctx.unique_fields(li, "drops/li")?;
    let mut item = None;
    let mut chance = None;
    let mut min = 1u32;
    let mut max = None;

    for field in fields {
        match field.tag_name().name() {
            "item" => item = Some(ctx.text(field)?),
            "chance" => {
                let value = ctx.non_negative(field)?;
                if value > 100.0 {
                    return Err(ctx.error_at(
                        ContentErrorCode::InvalidValue,
                        "chance must be a percentage in [0, 100]".to_string(),
                        field,
                    ));
                }
                chance = Some(value);
            }
            "min" => min = ctx.number(field)?,
            "max" => max = Some(ctx.number(field)?),
            other => return Err(ctx.unknown_field(field, other, "drops/li")),
        }
    }

    let Some(item) = item else {
        return Err(ctx.missing_field(li, "item", "drops/li"));
    };
    let Some(chance) = chance else {
        return Err(ctx.missing_field(li, "chance", "drops/li"));
    };
    Ok(DropDef {
        item,
        chance,
        min,
        max: max.unwrap_or(min),
    })
}

fn parse_item_def(ctx: &ParseCtx<'_, '_>, node: Node<'_, '_>) -> Result<ItemDef, ContentCompileError> {
    let fields = ctx.unique_fields(node, "ItemDef")?;
    let mut def = ItemDef::with_name(ctx.def_name(node, &fields, "ItemDef")?);

    for field in fields {
        match field.tag_name().name() {
            "defName" => {}
            "label" => def.label = ctx.text(field)?,
            "hpGiven" => def.hp_given = ctx.number(field)?,
            "speedGiven" => def.speed_given = ctx.number(field)?,
            "speedDuration" => def.speed_duration = ctx.non_negative(field)?,
            "damageGiven" => def.damage_given = ctx.number(field)?,
            "damageDuration" => def.damage_duration = ctx.non_negative(field)?,
            "givesInvincibility" => def.gives_invincibility = ctx.flag(field)?,
            "invincibilityDuration" => def.invincibility_duration = ctx.non_negative(field)?,
            other => return Err(ctx.unknown_field(field, other, "ItemDef")),
        }
    }
    Ok(def)
}

fn parse_challenge_def(
    ctx: &ParseCtx<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ChallengeDef, ContentCompileError> {
    let fields = ctx.unique_fields(node, "ChallengeDef")?;
    let mut def = ChallengeDef::with_name(ctx.def_name(node, &fields, "ChallengeDef")?);

    for field in fields {
        match field.tag_name().name() {
            "defName" => {}
            "label" => def.label = ctx.text(field)?,
            "spawnDelay" => def.spawn_delay = ctx.non_negative(field)?,
            "delayBeforeSpawn" => def.delay_before_spawn = ctx.non_negative(field)?,
            "enemies" => {
                def.enemies = ctx
                    .list_items(field)?
                    .into_iter()
                    .map(|li| ctx.text(li))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            other => return Err(ctx.unknown_field(field, other, "ChallengeDef")),
        }
    }
    Ok(def)
}

struct ParseCtx<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseCtx<'_, '_> {
    fn location_of(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location_of(node)),
        }
    }

    fn unknown_field(&self, field: Node<'_, '_>, name: &str, owner: &str) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::UnknownField,
            format!("unknown field <{name}> in <{owner}>"),
            field,
        )
    }

    fn missing_field(&self, node: Node<'_, '_>, name: &str, owner: &str) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::MissingField,
            format!("missing required field <{name}> in <{owner}>"),
            node,
        )
    }

    /// Element children of `node`, rejecting repeated field names.
    fn unique_fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        owner: &str,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        let mut seen = HashSet::<&str>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            if !seen.insert(field.tag_name().name()) {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{}> in <{owner}>", field.tag_name().name()),
                    field,
                ));
            }
            fields.push(field);
        }
        Ok(fields)
    }

    fn def_name(
        &self,
        node: Node<'_, '_>,
        fields: &[Node<'_, '_>],
        owner: &str,
    ) -> Result<String, ContentCompileError> {
        match fields
            .iter()
            .find(|field| field.tag_name().name() == "defName")
        {
            Some(field) => self.text(*field),
            None => Err(self.missing_field(node, "defName", owner)),
        }
    }

    fn text(&self, node: Node<'_, '_>) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", node.tag_name().name()),
                node,
            ));
        }
        Ok(value)
    }

    fn number<T: FromStr>(&self, node: Node<'_, '_>) -> Result<T, ContentCompileError> {
        let value = self.text(node)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{}' is not a valid {}",
                    node.tag_name().name(),
                    value,
                    std::any::type_name::<T>()
                ),
                node,
            )
        })
    }

    fn non_negative(&self, node: Node<'_, '_>) -> Result<f32, ContentCompileError> {
        let value = self.number::<f32>(node)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} must be finite and >= 0", node.tag_name().name()),
                node,
            ));
        }
        Ok(value)
    }

    fn positive_count(&self, node: Node<'_, '_>) -> Result<u32, ContentCompileError> {
        let value = self.number::<u32>(node)?;
        if value == 0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{} must be > 0", node.tag_name().name()),
                node,
            ));
        }
        Ok(value)
    }

    fn flag(&self, node: Node<'_, '_>) -> Result<bool, ContentCompileError> {
        match self.text(node)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{other}' is not a boolean; allowed values: true, false",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    /// `<li>` children of a list field.
    fn list_items<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        node.children()
            .filter(|child| child.is_element())
            .map(|child| {
                if child.tag_name().name() == "li" {
                    Ok(child)
                } else {
                    Err(self.error_at(
                        ContentErrorCode::UnknownField,
                        format!(
                            "list <{}> may only contain <li> entries, found <{}>",
                            node.tag_name().name(),
                            child.tag_name().name()
                        ),
                        child,
                    ))
                }
            })
            .collect()
    }
}

fn read_error(mod_id: &str, path: PathBuf, message: String) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message,
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentLoadError, fallback_path: &Path) -> ContentCompileError {
    match error {
        ContentLoadError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: fallback_path.to_path_buf(),
            location: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn setup_app_paths(root: &Path) -> AppPaths {
        let base = root.join("assets").join("base");
        let mods = root.join("mods");
        fs::create_dir_all(&base).expect("base");
        fs::create_dir_all(&mods).expect("mods");
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: base,
            mods_dir: mods,
            scenarios_dir: root.join("assets").join("scenarios"),
        }
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn compile_base(xml: &str) -> Result<DefDatabase, ContentCompileError> {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(&app.base_content_dir.join("defs.xml"), xml);
        compile_def_database(&app, &ContentRequest::default())
    }

    #[test]
    fn full_enemy_def_with_drops_compiles() {
        let db = compile_base(
            r#"<Defs>
                <ItemDef><defName>potion</defName><hpGiven>3</hpGiven></ItemDef>
                <EnemyDef>
                    <defName>slime</defName>
                    <label>Slime</label>
                    <maxHealth>4</maxHealth>
                    <attackCooldown>1.5</attackCooldown>
                    <drops>
                        <li><item>potion</item><chance>50</chance><min>1</min><max>3</max></li>
                        <li><item>potion</item><chance>100</chance></li>
                    </drops>
                </EnemyDef>
            </Defs>"#,
        )
        .expect("compile");

        let slime = db.enemy_def("slime").expect("slime");
        assert_eq!(slime.label, "Slime");
        assert_eq!(slime.max_health, 4);
        assert!((slime.attack_cooldown - 1.5).abs() < f32::EPSILON);
        assert!((slime.detection_range - 7.0).abs() < f32::EPSILON);
        assert_eq!(slime.drops.len(), 2);
        assert_eq!(slime.drops[0].max, 3);
        assert_eq!((slime.drops[1].min, slime.drops[1].max), (1, 1));
        assert_eq!(db.item_def("potion").expect("potion").hp_given, 3);
        assert_eq!(db.fingerprint().len(), 64);
    }

    #[test]
    fn item_and_challenge_fields_parse() {
        let db = compile_base(
            r#"<Defs>
                <EnemyDef><defName>bat</defName></EnemyDef>
                <ItemDef>
                    <defName>elixir</defName>
                    <speedGiven>-2</speedGiven>
                    <speedDuration>4</speedDuration>
                    <givesInvincibility>true</givesInvincibility>
                    <invincibilityDuration>2.5</invincibilityDuration>
                </ItemDef>
                <ChallengeDef>
                    <defName>arena</defName>
                    <enemies><li>bat</li><li>bat</li></enemies>
                    <spawnDelay>0.25</spawnDelay>
                </ChallengeDef>
            </Defs>"#,
        )
        .expect("compile");

        let elixir = db.item_def("elixir").expect("elixir");
        assert_eq!(elixir.speed_given, -2);
        assert!(elixir.gives_invincibility);
        let arena = db.challenge_def("arena").expect("arena");
        assert_eq!(arena.enemies, vec!["bat".to_string(), "bat".to_string()]);
        assert!((arena.delay_before_spawn - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_def_name_reports_mod_file_and_location() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            r#"<Defs><EnemyDef><label>X</label></EnemyDef></Defs>"#,
        );
        let err = compile_def_database(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.mod_id, "base");
        assert!(err
            .file_path
            .ends_with(Path::new("assets").join("base").join("defs.xml")));
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_field_and_def_type_error() {
        let err = compile_base(r#"<Defs><EnemyDef><defName>a</defName><mood>Happy</mood></EnemyDef></Defs>"#)
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);

        let err = compile_base(r#"<Defs><ShopDef><defName>a</defName></ShopDef></Defs>"#)
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn invalid_values_error() {
        for xml in [
            r#"<Defs><EnemyDef><defName>a</defName><moveSpeed>-1</moveSpeed></EnemyDef></Defs>"#,
            r#"<Defs><EnemyDef><defName>a</defName><maxHealth>0</maxHealth></EnemyDef></Defs>"#,
            r#"<Defs><ItemDef><defName>a</defName><givesInvincibility>yes</givesInvincibility></ItemDef></Defs>"#,
            r#"<Defs><ItemDef><defName>a</defName><speedGiven>fast</speedGiven></ItemDef></Defs>"#,
            r#"<Defs><ItemDef><defName>i</defName></ItemDef><EnemyDef><defName>a</defName><drops><li><item>i</item><chance>150</chance></li></drops></EnemyDef></Defs>"#,
        ] {
            let err = compile_base(xml).expect_err("err");
            assert_eq!(err.code, ContentErrorCode::InvalidValue, "{xml}");
        }
    }

    #[test]
    fn duplicate_field_errors() {
        let err = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><damage>1</damage><damage>2</damage></EnemyDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile_base(r#"<Defs><EnemyDef><defName>a</defName></Defs>"#).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn unresolved_references_error() {
        let err = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><drops><li><item>ghost</item><chance>5</chance></li></drops></EnemyDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnresolvedReference);

        let err = compile_base(
            r#"<Defs><ChallengeDef><defName>c</defName><enemies><li>nobody</li></enemies></ChallengeDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnresolvedReference);
    }

    #[test]
    fn same_mod_duplicate_def_errors_but_different_kinds_coexist() {
        let err = compile_base(
            r#"<Defs>
                <EnemyDef><defName>a</defName></EnemyDef>
                <EnemyDef><defName>a</defName></EnemyDef>
            </Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDefInMod);

        let db = compile_base(
            r#"<Defs>
                <EnemyDef><defName>a</defName></EnemyDef>
                <ItemDef><defName>a</defName></ItemDef>
            </Defs>"#,
        )
        .expect("compile");
        assert!(db.enemy_def("a").is_some());
        assert!(db.item_def("a").is_some());
    }

    #[test]
    fn cross_mod_duplicate_is_last_mod_wins() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            r#"<Defs><PlayerDef><defName>hero</defName><moveSpeed>1.0</moveSpeed></PlayerDef></Defs>"#,
        );
        write_file(
            &app.mods_dir.join("moda").join("defs.xml"),
            r#"<Defs><PlayerDef><defName>hero</defName><moveSpeed>7.0</moveSpeed></PlayerDef></Defs>"#,
        );
        let base_only = compile_def_database(&app, &ContentRequest::default()).expect("compile");
        let modded =
            compile_def_database(&app, &ContentRequest::with_mods(["moda"])).expect("compile");

        let hero = modded.player_def("hero").expect("hero");
        assert!((hero.move_speed - 7.0).abs() < f32::EPSILON);
        assert_eq!(hero.max_attack_points, 5);
        assert_ne!(base_only.fingerprint(), modded.fingerprint());
    }

    #[test]
    fn missing_enabled_mod_is_discovery_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        let err = compile_def_database(&app, &ContentRequest::with_mods(["absent"]))
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::Discovery);
        assert_eq!(err.mod_id, "absent");
    }
}
