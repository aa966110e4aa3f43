//! Rewrites the coordinate-bearing fields of one decoded chunk.
//!
//! Every compound that changes is rebuilt from the recomputed fields first and
//! then topped up with the untouched entries of the input compound, so unknown
//! keys pass through unchanged. The input tree is never modified.

use crate::nbt::{Compound, NamedTag, Tag, TagError, TagKind, TagList};

use super::delta::ShiftDelta;
use super::uuid_source::{uuid_to_halves, UuidSource};

const LEVEL: &str = "Level";
const X_POS: &str = "xPos";
const Z_POS: &str = "zPos";
const ENTITIES: &str = "Entities";
const PASSENGERS: &str = "Passengers";
const POS: &str = "Pos";
const UUID_MOST: &str = "UUIDMost";
const UUID_LEAST: &str = "UUIDLeast";
/// Lists whose compounds carry absolute integer block coordinates `x`/`z`.
const BLOCK_POSITIONED_LISTS: [&str; 3] = ["TileEntities", "TileTicks", "LiquidTicks"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("`{field}` = {value} overflows when shifted by {offset}")]
    CoordinateOverflow {
        field: &'static str,
        value: i64,
        offset: i64,
    },
}

/// Shifts a chunk root by `delta`. With `regenerate_uuids`, every entity
/// gets a fresh `UUIDMost`/`UUIDLeast` pair from `uuids`.
pub fn shift_chunk(
    root: &NamedTag,
    delta: ShiftDelta,
    regenerate_uuids: bool,
    uuids: &mut dyn UuidSource,
) -> Result<NamedTag, TransformError> {
    let root_compound = root.compound()?;
    let level = root_compound.get_compound(LEVEL)?;
    let shifted_level = shift_level(level, delta, regenerate_uuids, uuids)?;

    let mut shifted_root = Compound::new().with(LEVEL, Tag::Compound(shifted_level));
    shifted_root.merge_absent(root_compound);
    Ok(NamedTag::new(root.name.clone(), Tag::Compound(shifted_root)))
}

fn shift_level(
    level: &Compound,
    delta: ShiftDelta,
    regenerate_uuids: bool,
    uuids: &mut dyn UuidSource,
) -> Result<Compound, TransformError> {
    let (chunk_dx, chunk_dz) = delta.chunk_offset();
    let x_pos = offset_int(X_POS, level.get_int(X_POS)?, chunk_dx)?;
    let z_pos = offset_int(Z_POS, level.get_int(Z_POS)?, chunk_dz)?;

    let mut shifted = Compound::new()
        .with(X_POS, Tag::Int(x_pos))
        .with(Z_POS, Tag::Int(z_pos));

    if level.contains_key(ENTITIES) {
        let entities = level.get_list(ENTITIES)?;
        let entities = shift_entities(ENTITIES, entities, delta, regenerate_uuids, uuids)?;
        shifted.insert(ENTITIES, Tag::List(entities));
    }

    for key in BLOCK_POSITIONED_LISTS {
        if level.contains_key(key) {
            let list = shift_block_positions(key, level.get_list(key)?, delta)?;
            shifted.insert(key, Tag::List(list));
        }
    }

    shifted.merge_absent(level);
    Ok(shifted)
}

fn shift_entities(
    key: &str,
    entities: &TagList,
    delta: ShiftDelta,
    regenerate_uuids: bool,
    uuids: &mut dyn UuidSource,
) -> Result<TagList, TransformError> {
    let mut shifted = Vec::with_capacity(entities.len());
    for entity in compounds(key, entities)? {
        let entity = shift_entity(entity, delta, regenerate_uuids, &mut *uuids)?;
        shifted.push(Tag::Compound(entity));
    }
    Ok(TagList::new(entities.element_kind(), shifted)?)
}

fn shift_entity(
    entity: &Compound,
    delta: ShiftDelta,
    regenerate_uuids: bool,
    uuids: &mut dyn UuidSource,
) -> Result<Compound, TransformError> {
    let pos = entity.get_list(POS)?;
    let x = pos.get_double(0)?;
    let y = pos.get_double(1)?;
    let z = pos.get_double(2)?;
    let shifted_pos = TagList::new(
        TagKind::Double,
        vec![
            Tag::Double(x + delta.dx() as f64),
            Tag::Double(y),
            Tag::Double(z + delta.dz() as f64),
        ],
    )?;

    let mut shifted = Compound::new().with(POS, Tag::List(shifted_pos));
    if regenerate_uuids {
        let (most, least) = uuid_to_halves(uuids.next_uuid());
        shifted.insert(UUID_MOST, Tag::Long(most));
        shifted.insert(UUID_LEAST, Tag::Long(least));
    }
    // Riders are stored inside their mount and carry their own position.
    if entity.contains_key(PASSENGERS) {
        let passengers = entity.get_list(PASSENGERS)?;
        let passengers = shift_entities(PASSENGERS, passengers, delta, regenerate_uuids, uuids)?;
        shifted.insert(PASSENGERS, Tag::List(passengers));
    }

    shifted.merge_absent(entity);
    Ok(shifted)
}

fn shift_block_positions(
    key: &'static str,
    list: &TagList,
    delta: ShiftDelta,
) -> Result<TagList, TransformError> {
    let mut shifted = Vec::with_capacity(list.len());
    for item in compounds(key, list)? {
        let x = offset_int("x", item.get_int("x")?, delta.dx())?;
        let z = offset_int("z", item.get_int("z")?, delta.dz())?;
        let mut rebuilt = Compound::new().with("x", Tag::Int(x)).with("z", Tag::Int(z));
        rebuilt.merge_absent(item);
        shifted.push(Tag::Compound(rebuilt));
    }
    Ok(TagList::new(list.element_kind(), shifted)?)
}

/// Compound elements of `list`. An empty list of any declared kind yields
/// nothing.
fn compounds<'a>(key: &str, list: &'a TagList) -> Result<Vec<&'a Compound>, TagError> {
    if list.is_empty() {
        return Ok(Vec::new());
    }
    if list.element_kind() != TagKind::Compound {
        return Err(TagError::TypeMismatch {
            key: key.to_string(),
            expected: TagKind::Compound,
            found: list.element_kind(),
        });
    }
    Ok(list
        .iter()
        .filter_map(|item| match item {
            Tag::Compound(compound) => Some(compound),
            _ => None,
        })
        .collect())
}

fn offset_int(field: &'static str, value: i32, offset: i64) -> Result<i32, TransformError> {
    (value as i64)
        .checked_add(offset)
        .and_then(|shifted| i32::try_from(shifted).ok())
        .ok_or(TransformError::CoordinateOverflow {
            field,
            value: value as i64,
            offset,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::uuid_source::{uuid_from_halves, RandomUuids};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    struct FixedUuids(Uuid);

    impl UuidSource for FixedUuids {
        fn next_uuid(&mut self) -> Uuid {
            self.0
        }
    }

    struct NoUuids;

    impl UuidSource for NoUuids {
        fn next_uuid(&mut self) -> Uuid {
            panic!("uuid requested while regeneration is off")
        }
    }

    fn doubles(values: [f64; 3]) -> Tag {
        Tag::List(TagList::new(TagKind::Double, values.map(Tag::Double).to_vec()).unwrap())
    }

    fn entity(pos: [f64; 3], most: i64, least: i64) -> Compound {
        Compound::new()
            .with("id", Tag::String("minecraft:cow".to_string()))
            .with(POS, doubles(pos))
            .with("Motion", doubles([0.0, -0.08, 0.0]))
            .with(UUID_MOST, Tag::Long(most))
            .with(UUID_LEAST, Tag::Long(least))
    }

    fn chunk(x_pos: i32, z_pos: i32, entities: Vec<Compound>) -> NamedTag {
        let entities = TagList::new(
            TagKind::Compound,
            entities.into_iter().map(Tag::Compound).collect(),
        )
        .unwrap();
        let tile_entity = Compound::new()
            .with("id", Tag::String("minecraft:chest".to_string()))
            .with("x", Tag::Int(x_pos * 16 + 3))
            .with("y", Tag::Int(70))
            .with("z", Tag::Int(z_pos * 16 + 4));
        let level = Compound::new()
            .with("LastUpdate", Tag::Long(12_345))
            .with(X_POS, Tag::Int(x_pos))
            .with(Z_POS, Tag::Int(z_pos))
            .with(ENTITIES, Tag::List(entities))
            .with(
                "TileEntities",
                Tag::List(TagList::new(TagKind::Compound, vec![Tag::Compound(tile_entity)]).unwrap()),
            )
            .with("TileTicks", Tag::List(TagList::empty()))
            .with("Biomes", Tag::ByteArray(vec![1; 4]))
            .with("FutureField", Tag::IntArray(vec![7, 8, 9]));
        NamedTag::new(
            "",
            Tag::Compound(
                Compound::new()
                    .with("DataVersion", Tag::Int(1343))
                    .with(LEVEL, Tag::Compound(level)),
            ),
        )
    }

    fn level_of(root: &NamedTag) -> &Compound {
        root.compound().unwrap().get_compound(LEVEL).unwrap()
    }

    fn entity_at(root: &NamedTag, index: usize) -> &Compound {
        match level_of(root).get_list(ENTITIES).unwrap().get(index).unwrap() {
            Tag::Compound(entity) => entity,
            other => panic!("expected compound entity, got {other:?}"),
        }
    }

    fn position(entity: &Compound) -> [f64; 3] {
        let pos = entity.get_list(POS).unwrap();
        [
            pos.get_double(0).unwrap(),
            pos.get_double(1).unwrap(),
            pos.get_double(2).unwrap(),
        ]
    }

    fn region_delta(rx: i32, rz: i32) -> ShiftDelta {
        ShiftDelta::from_regions(rx, rz)
    }

    #[test]
    fn shifts_one_region_east() {
        let root = chunk(5, 10, vec![entity([85.0, 64.0, 170.0], 1, 2)]);
        let shifted = shift_chunk(&root, region_delta(1, 0), false, &mut NoUuids).unwrap();

        let level = level_of(&shifted);
        assert_eq!(level.get_int(X_POS), Ok(37));
        assert_eq!(level.get_int(Z_POS), Ok(10));
        let moved = entity_at(&shifted, 0);
        assert_eq!(position(moved), [597.0, 64.0, 170.0]);
        assert_eq!(moved.get_long(UUID_MOST), Ok(1));
        assert_eq!(moved.get_long(UUID_LEAST), Ok(2));
    }

    #[test]
    fn preserves_unknown_fields_at_every_level() {
        let root = chunk(0, 0, vec![entity([1.5, 2.0, 3.5], 1, 2)]);
        let shifted = shift_chunk(&root, region_delta(-3, 2), false, &mut NoUuids).unwrap();

        assert_eq!(shifted.compound().unwrap().get_int("DataVersion"), Ok(1343));
        let level = level_of(&shifted);
        assert_eq!(level.get_long("LastUpdate"), Ok(12_345));
        assert_eq!(level.get("Biomes"), Some(&Tag::ByteArray(vec![1; 4])));
        assert_eq!(level.get("FutureField"), Some(&Tag::IntArray(vec![7, 8, 9])));
        assert_eq!(level.get_list("TileTicks").unwrap().len(), 0);
        let moved = entity_at(&shifted, 0);
        assert_eq!(
            moved.get("id"),
            Some(&Tag::String("minecraft:cow".to_string()))
        );
        assert_eq!(moved.get("Motion"), Some(&doubles([0.0, -0.08, 0.0])));
        assert_eq!(position(moved), [1.5 - 1536.0, 2.0, 3.5 + 1024.0]);
    }

    #[test]
    fn shifts_block_entity_coordinates() {
        let root = chunk(2, 3, Vec::new());
        let shifted = shift_chunk(&root, region_delta(1, -1), false, &mut NoUuids).unwrap();
        let tiles = level_of(&shifted).get_list("TileEntities").unwrap();
        let Tag::Compound(chest) = tiles.get(0).unwrap() else {
            panic!("tile entity should stay a compound");
        };
        assert_eq!(chest.get_int("x"), Ok(2 * 16 + 3 + 512));
        assert_eq!(chest.get_int("y"), Ok(70));
        assert_eq!(chest.get_int("z"), Ok(3 * 16 + 4 - 512));
    }

    #[test]
    fn zero_shift_is_identity() {
        let root = chunk(-7, 12, vec![entity([-100.25, 5.0, 200.75], -9, 9)]);
        let shifted = shift_chunk(&root, ShiftDelta::ZERO, false, &mut NoUuids).unwrap();
        assert_eq!(shifted, root);
    }

    #[test]
    fn shifts_compose_additively() {
        let root = chunk(4, -4, vec![entity([70.5, 1.0, -60.5], 3, 4)]);
        let d1 = region_delta(2, -1);
        let d2 = region_delta(-5, 3);
        let stepwise = shift_chunk(
            &shift_chunk(&root, d1, false, &mut NoUuids).unwrap(),
            d2,
            false,
            &mut NoUuids,
        )
        .unwrap();
        let direct = shift_chunk(&root, d1.checked_add(d2).unwrap(), false, &mut NoUuids).unwrap();
        assert_eq!(stepwise, direct);
    }

    #[test]
    fn negated_shift_restores_original() {
        let root = chunk(31, 0, vec![entity([511.5, 80.0, 0.25], 5, 6)]);
        let delta = region_delta(7, -2);
        let there = shift_chunk(&root, delta, false, &mut NoUuids).unwrap();
        assert_ne!(there, root);
        let back = shift_chunk(&there, delta.negated(), false, &mut NoUuids).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn input_tree_is_left_untouched() {
        let root = chunk(1, 1, vec![entity([1.0, 2.0, 3.0], 1, 1)]);
        let snapshot = root.clone();
        let mut uuids = RandomUuids::new(StdRng::seed_from_u64(3));
        let _ = shift_chunk(&root, region_delta(4, 4), true, &mut uuids).unwrap();
        assert_eq!(root, snapshot);
    }

    #[test]
    fn regenerates_uuids_for_every_entity() {
        let root = chunk(
            0,
            0,
            vec![
                entity([1.0, 2.0, 3.0], 100, 200),
                entity([4.0, 5.0, 6.0], 300, 400),
            ],
        );
        let mut uuids = RandomUuids::new(StdRng::seed_from_u64(42));
        let shifted = shift_chunk(&root, region_delta(0, 1), true, &mut uuids).unwrap();

        let mut seen = Vec::new();
        for index in 0..2 {
            let before = entity_at(&root, index);
            let after = entity_at(&shifted, index);
            let most = after.get_long(UUID_MOST).unwrap();
            let least = after.get_long(UUID_LEAST).unwrap();
            assert_ne!(most, before.get_long(UUID_MOST).unwrap());
            assert_ne!(least, before.get_long(UUID_LEAST).unwrap());
            let uuid = uuid_from_halves(most, least);
            assert_eq!(uuid.get_version(), Some(uuid::Version::Random));
            seen.push(uuid);
        }
        assert_ne!(seen[0], seen[1]);
    }

    #[test]
    fn injected_source_gives_exact_uuid_halves() {
        let root = chunk(0, 0, vec![entity([0.0, 0.0, 0.0], 1, 2)]);
        let fixed = Uuid::from_u128(0x0123_4567_89ab_4def_8123_4567_89ab_cdef);
        let shifted = shift_chunk(&root, ShiftDelta::ZERO, true, &mut FixedUuids(fixed)).unwrap();
        let moved = entity_at(&shifted, 0);
        assert_eq!(moved.get_long(UUID_MOST), Ok(0x0123_4567_89ab_4def));
        assert_eq!(
            moved.get_long(UUID_LEAST),
            Ok(0x8123_4567_89ab_cdef_u64 as i64)
        );
    }

    #[test]
    fn passengers_move_with_their_mount() {
        let rider = entity([10.0, 65.0, 20.0], 7, 8);
        let mount = entity([10.0, 64.0, 20.0], 5, 6).with(
            PASSENGERS,
            Tag::List(TagList::new(TagKind::Compound, vec![Tag::Compound(rider)]).unwrap()),
        );
        let root = chunk(0, 0, vec![mount]);
        let shifted = shift_chunk(&root, region_delta(1, 1), false, &mut NoUuids).unwrap();
        let moved = entity_at(&shifted, 0);
        let Tag::Compound(rider) = moved.get_list(PASSENGERS).unwrap().get(0).unwrap() else {
            panic!("passenger should stay a compound");
        };
        assert_eq!(position(rider), [522.0, 65.0, 532.0]);
    }

    #[test]
    fn missing_level_is_reported() {
        let root = NamedTag::new("", Tag::Compound(Compound::new().with("DataVersion", Tag::Int(1))));
        let err = shift_chunk(&root, ShiftDelta::ZERO, false, &mut NoUuids).unwrap_err();
        assert_eq!(
            err,
            TransformError::Tag(TagError::KeyNotFound {
                key: LEVEL.to_string()
            })
        );
    }

    #[test]
    fn mistyped_chunk_coordinate_is_reported() {
        let mut root = chunk(0, 0, Vec::new());
        let Tag::Compound(top) = &mut root.tag else {
            unreachable!()
        };
        let mut level = top.get_compound(LEVEL).unwrap().clone();
        level.insert(X_POS, Tag::Long(0));
        top.insert(LEVEL, Tag::Compound(level));

        let err = shift_chunk(&root, ShiftDelta::ZERO, false, &mut NoUuids).unwrap_err();
        assert!(matches!(
            err,
            TransformError::Tag(TagError::TypeMismatch {
                expected: TagKind::Int,
                found: TagKind::Long,
                ..
            })
        ));
    }

    #[test]
    fn chunk_coordinate_overflow_is_an_error() {
        let level = Compound::new()
            .with(X_POS, Tag::Int(i32::MAX - 10))
            .with(Z_POS, Tag::Int(0));
        let root = NamedTag::new("", Tag::Compound(Compound::new().with(LEVEL, Tag::Compound(level))));
        let err = shift_chunk(&root, region_delta(1, 0), false, &mut NoUuids).unwrap_err();
        assert_eq!(
            err,
            TransformError::CoordinateOverflow {
                field: X_POS,
                value: (i32::MAX - 10) as i64,
                offset: 32,
            }
        );
    }

    #[test]
    fn block_coordinate_overflow_is_an_error() {
        let ticks = TagList::new(
            TagKind::Compound,
            vec![Tag::Compound(
                Compound::new()
                    .with("x", Tag::Int(0))
                    .with("z", Tag::Int(i32::MIN + 100)),
            )],
        )
        .unwrap();
        let level = Compound::new()
            .with(X_POS, Tag::Int(0))
            .with(Z_POS, Tag::Int(0))
            .with("LiquidTicks", Tag::List(ticks));
        let root = NamedTag::new("", Tag::Compound(Compound::new().with(LEVEL, Tag::Compound(level))));
        let err = shift_chunk(&root, region_delta(0, -1), false, &mut NoUuids).unwrap_err();
        assert!(matches!(
            err,
            TransformError::CoordinateOverflow { field: "z", offset: -512, .. }
        ));
    }

    #[test]
    fn chunk_without_entities_list_still_shifts() {
        let level = Compound::new().with(X_POS, Tag::Int(1)).with(Z_POS, Tag::Int(2));
        let root = NamedTag::new("", Tag::Compound(Compound::new().with(LEVEL, Tag::Compound(level))));
        let shifted = shift_chunk(&root, region_delta(0, 2), false, &mut NoUuids).unwrap();
        assert_eq!(level_of(&shifted).get_int(Z_POS), Ok(66));
        assert!(!level_of(&shifted).contains_key(ENTITIES));
    }
}
