//! Authority-side attachment lifecycle: slot add/remove, socket
//! overrides, visual swaps, handler dispatch order.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use itemrig::handlers::ActorHandler;
use itemrig::items::{
    ActorAttachmentFragment, AnimLayerFragment, SceneNodeAttachmentFragment,
    VisualAttachmentFragment,
};
use itemrig::{
    AssetRef, AttachmentContext, AttachmentEngine, AttachmentHandler, BuiltSlot, ComponentTag,
    DefinitionCatalog, EngineSettings, Fragment, FragmentKind, HandlerCommon, ItemDefId,
    ItemDefinition, ItemEntry, ItemId, MemoryItemStore, Scene, SceneGraph, SlotEvent, SlotId,
    SlotTable, SocketEntry, SocketName, Transform, TransformFinder,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

const BACK_TABLE: &str = r#"
    [[slots]]
    slot_id = "Back"

    [[slots.sockets]]
    socket_name = "Back_Socket"

    [[slots.handlers]]
    type = "SceneNode"

    [[slots.handlers]]
    type = "Actor"
"#;

fn back_table() -> Arc<SlotTable> {
    Arc::new(SlotTable::from_toml_str(BACK_TABLE).unwrap())
}

fn back() -> SlotId {
    SlotId::new("Back")
}

fn rifle_def() -> ItemDefinition {
    ItemDefinition::new("rifle").with_fragment(Fragment::ActorAttachment(
        ActorAttachmentFragment {
            actor: AssetRef::new("actors/rifle"),
        },
    ))
}

/// Catalog + store with one rifle sitting in the Back slot
fn rifle_fixture() -> (DefinitionCatalog, MemoryItemStore, ItemId) {
    let mut catalog = DefinitionCatalog::new();
    let rifle = catalog.register(rifle_def());

    let mut store = MemoryItemStore::new();
    let mut entry = ItemEntry::new(rifle);
    entry.slot_id = Some(back());
    let item_id = store.insert(entry);

    (catalog, store, item_id)
}

#[test]
fn adding_an_item_spawns_its_actor_on_the_slot_socket() {
    init_tracing();
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    let actor = engine.attached_actor(&item_id).expect("actor spawned");
    assert_eq!(scene.parent_of(actor), Some(scene.root()));
    assert_eq!(scene.socket_of(actor), Some(&SocketName::new("Back_Socket")));
    assert!(engine.is_socket_taken(&back(), &SocketName::new("Back_Socket")));
    assert!(engine.does_slot_have_attachment(&back()));
    assert!(engine.does_slot_have_attached_actor(&back()));
}

#[test]
fn re_adding_the_same_item_is_a_no_op() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    assert_eq!(engine.records().len(), 1);
    // root plus exactly one representation
    assert_eq!(scene.node_count(), 2);
}

#[test]
fn removal_tears_everything_down() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);
    engine.on_item_removed_from_slot(&store, &catalog, &mut scene, &back(), item_id);

    assert!(engine.records().is_empty());
    assert!(engine.attached_actor(&item_id).is_none());
    assert!(!engine.is_socket_taken(&back(), &SocketName::new("Back_Socket")));
    assert!(!engine.does_slot_have_attachment(&back()));
    assert_eq!(scene.node_count(), 1);
}

#[test]
fn socket_override_moves_the_actor_and_back() {
    init_tracing();
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let hands = scene.add_tagged_node(ComponentTag::new("Hands"));
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    engine.attach_item_to_socket(
        &catalog,
        &mut scene,
        item_id,
        SocketName::new("Hand_R"),
        Some(ComponentTag::new("Hands")),
        Transform::IDENTITY,
    );

    let actor = engine.attached_actor(&item_id).expect("actor still live");
    assert_eq!(scene.parent_of(actor), Some(hands));
    assert_eq!(scene.socket_of(actor), Some(&SocketName::new("Hand_R")));
    assert_eq!(engine.item_socket(&item_id), Some(SocketName::new("Hand_R")));

    engine.detach_item_from_socket(&catalog, &mut scene, item_id);

    assert_eq!(scene.parent_of(actor), Some(scene.root()));
    assert_eq!(
        engine.item_socket(&item_id),
        Some(SocketName::new("Back_Socket"))
    );
}

#[test]
fn socket_override_falls_back_to_root_when_tag_is_missing() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    engine.attach_item_to_socket(
        &catalog,
        &mut scene,
        item_id,
        SocketName::new("Hand_R"),
        Some(ComponentTag::new("NoSuchComponent")),
        Transform::IDENTITY,
    );

    let actor = engine.attached_actor(&item_id).unwrap();
    assert_eq!(scene.parent_of(actor), Some(scene.root()));
    assert_eq!(scene.socket_of(actor), Some(&SocketName::new("Hand_R")));
}

#[test]
fn visual_override_respawns_and_reset_restores() {
    init_tracing();
    let mut catalog = DefinitionCatalog::new();
    let rifle = catalog.register(rifle_def());
    let gold = catalog.register(ItemDefinition::new("rifle_gold").with_fragment(
        Fragment::ActorAttachment(ActorAttachmentFragment {
            actor: AssetRef::new("actors/rifle_gold"),
        }),
    ));

    let mut store = MemoryItemStore::new();
    let mut entry = ItemEntry::new(rifle);
    entry.slot_id = Some(back());
    let item_id = store.insert(entry);

    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    engine.set_visual_item_attachment(&catalog, &mut scene, item_id, gold);
    let actor = engine.attached_actor(&item_id).expect("respawned as gold");
    assert_eq!(
        scene.node(actor).unwrap().asset,
        Some(AssetRef::new("actors/rifle_gold"))
    );

    engine.reset_visual_item_attachment(&catalog, &mut scene, item_id);
    let actor = engine.attached_actor(&item_id).expect("respawned as base");
    assert_eq!(
        scene.node(actor).unwrap().asset,
        Some(AssetRef::new("actors/rifle"))
    );
    // occupancy survives the respawns
    assert!(engine.is_socket_taken(&back(), &SocketName::new("Back_Socket")));
}

#[test]
fn default_visual_fragment_spawns_the_stand_in() {
    let mut catalog = DefinitionCatalog::new();
    let gold = catalog.register(ItemDefinition::new("rifle_gold").with_fragment(
        Fragment::ActorAttachment(ActorAttachmentFragment {
            actor: AssetRef::new("actors/rifle_gold"),
        }),
    ));
    let rifle = catalog.register(
        rifle_def().with_fragment(Fragment::VisualAttachment(VisualAttachmentFragment {
            default_visual: Some(gold),
        })),
    );

    let mut store = MemoryItemStore::new();
    let mut entry = ItemEntry::new(rifle);
    entry.slot_id = Some(back());
    let item_id = store.insert(entry);

    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    let actor = engine.attached_actor(&item_id).unwrap();
    assert_eq!(
        scene.node(actor).unwrap().asset,
        Some(AssetRef::new("actors/rifle_gold"))
    );
}

#[test]
fn spawn_waits_for_the_avatar_and_replays_on_ready() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    scene.set_avatar_ready(false);
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);
    assert_eq!(engine.records().len(), 1);
    assert!(engine.attached_actor(&item_id).is_none());

    scene.set_avatar_ready(true);
    engine.on_avatar_ready(&catalog, &mut scene);
    assert!(engine.attached_actor(&item_id).is_some());
}

#[test]
fn headless_engine_keeps_records_but_never_touches_the_scene() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::headless());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    assert_eq!(engine.records().len(), 1);
    assert!(engine.is_socket_taken(&back(), &SocketName::new("Back_Socket")));
    assert!(engine.attached_actor(&item_id).is_none());
    assert_eq!(scene.node_count(), 1);
}

#[test]
fn slot_events_reach_subscribers() {
    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    engine.events().subscribe(move |event| {
        sink.borrow_mut().push(event.clone());
    });

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);
    engine.on_item_removed_from_slot(&store, &catalog, &mut scene, &back(), item_id);

    let events = seen.borrow();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], SlotEvent::AddedToSlot { item, .. } if *item == item_id));
    assert!(matches!(&events[1], SlotEvent::RemovedFromSlot { item, .. } if *item == item_id));
}

/// Test handler counting how often each dispatch capability fires
struct CountingHandler {
    common: HandlerCommon,
    adds: Rc<Cell<u32>>,
    removals: Rc<Cell<u32>>,
}

impl CountingHandler {
    fn boxed(adds: Rc<Cell<u32>>, removals: Rc<Cell<u32>>) -> Box<dyn AttachmentHandler> {
        Box::new(Self {
            common: HandlerCommon::new(vec![SocketEntry::new("Back_Socket")]),
            adds,
            removals,
        })
    }
}

impl AttachmentHandler for CountingHandler {
    fn supported_fragment(&self) -> Option<FragmentKind> {
        Some(FragmentKind::ActorAttachment)
    }

    fn handle_item_added_to_slot(
        &self,
        ctx: &mut AttachmentContext,
        item: &ItemEntry,
        owner: Option<&ItemEntry>,
    ) -> bool {
        self.adds.set(self.adds.get() + 1);
        if let Some(record) = self.common.make_record(ctx, item, owner) {
            ctx.add_attached_record(record);
        }
        true
    }

    fn handle_item_removed_from_slot(
        &self,
        ctx: &mut AttachmentContext,
        item: &ItemEntry,
        _slot: &SlotId,
        _owner: Option<&ItemEntry>,
    ) {
        self.removals.set(self.removals.get() + 1);
        ctx.remove_record(&item.id);
    }
}

#[test]
fn add_short_circuits_but_removal_notifies_all_handlers() {
    init_tracing();
    let adds_a = Rc::new(Cell::new(0));
    let adds_b = Rc::new(Cell::new(0));
    let removals_a = Rc::new(Cell::new(0));
    let removals_b = Rc::new(Cell::new(0));

    let mut table = SlotTable::new();
    table.push(BuiltSlot::new(
        back(),
        vec![SocketEntry::new("Back_Socket")],
        vec![
            CountingHandler::boxed(adds_a.clone(), removals_a.clone()),
            CountingHandler::boxed(adds_b.clone(), removals_b.clone()),
        ],
    ));

    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(Arc::new(table), EngineSettings::default());

    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);
    // the first handler claimed the add; the second never saw it
    assert_eq!(adds_a.get(), 1);
    assert_eq!(adds_b.get(), 0);

    engine.on_item_removed_from_slot(&store, &catalog, &mut scene, &back(), item_id);
    assert_eq!(removals_a.get(), 1);
    assert_eq!(removals_b.get(), 1);
}

#[test]
fn anim_layers_link_swap_and_restore_baseline() {
    init_tracing();
    let mut catalog = DefinitionCatalog::new();
    let rifle = catalog.register(rifle_def().with_fragment(Fragment::AnimLayer(
        AnimLayerFragment {
            layers: vec![AssetRef::new("anim/rifle_layer")],
        },
    )));
    let pistol = catalog.register(ItemDefinition::new("pistol").with_fragment(
        Fragment::AnimLayer(AnimLayerFragment {
            layers: vec![AssetRef::new("anim/pistol_layer")],
        }),
    ));

    let mut store = MemoryItemStore::new();
    let mut rifle_entry = ItemEntry::new(rifle);
    rifle_entry.slot_id = Some(back());
    let rifle_item = store.insert(rifle_entry);
    let pistol_item = store.insert(ItemEntry::new(pistol));

    let mut scene = SceneGraph::new();
    let settings = EngineSettings {
        default_anim_layers: vec![AssetRef::new("anim/unarmed")],
        ..EngineSettings::default()
    };
    let mut engine = AttachmentEngine::new(back_table(), settings);

    engine.link_anim_layer_for_slot(&store, &catalog, &mut scene, &back());
    assert_eq!(
        scene.linked_layers().to_vec(),
        vec![AssetRef::new("anim/rifle_layer")]
    );
    let linked = engine.linked_anim_layer().unwrap();
    assert_eq!(linked.source_item_def, Some(rifle));
    assert_eq!(linked.owning_item, Some(rifle_item));

    // linking another item's layers swaps the previous set out
    engine.link_anim_layer_for_item(&store, &catalog, &mut scene, pistol_item);
    assert_eq!(
        scene.linked_layers().to_vec(),
        vec![AssetRef::new("anim/pistol_layer")]
    );

    // an observer applies the replicated value straight in
    let mut observer = AttachmentEngine::new(back_table(), EngineSettings::default());
    let mut observer_scene = SceneGraph::new();
    observer
        .apply_linked_anim_layer(&mut observer_scene, engine.linked_anim_layer().unwrap().clone());
    assert_eq!(
        observer_scene.linked_layers().to_vec(),
        vec![AssetRef::new("anim/pistol_layer")]
    );

    engine.unlink_anim_layer(&store, &mut scene, &back());
    assert_eq!(
        scene.linked_layers().to_vec(),
        vec![AssetRef::new("anim/unarmed")]
    );
    let baseline = engine.linked_anim_layer().unwrap();
    assert!(baseline.source_item_def.is_none());
    assert_eq!(baseline.owning_item, Some(rifle_item));
}

/// Finder pinning every item of its slot to one socket
struct LeftHandFinder;

impl TransformFinder for LeftHandFinder {
    fn find_socket_name(
        &self,
        _ctx: &AttachmentContext,
        _item: &ItemEntry,
        _owner: Option<&ItemEntry>,
    ) -> Option<SocketName> {
        Some(SocketName::new("Hand_L"))
    }
}

#[test]
fn transform_finder_wins_over_configured_sockets() {
    let mut table = SlotTable::new();
    table.push(BuiltSlot::new(
        back(),
        vec![SocketEntry::new("Back_Socket")],
        vec![Box::new(ActorHandler::new(
            HandlerCommon::new(vec![SocketEntry::new("Back_Socket")])
                .with_transform_finder(Box::new(LeftHandFinder)),
        ))],
    ));

    let (catalog, store, item_id) = rifle_fixture();
    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(Arc::new(table), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    assert_eq!(engine.item_socket(&item_id), Some(SocketName::new("Hand_L")));
    assert!(engine.is_socket_taken(&back(), &SocketName::new("Hand_L")));
    assert!(!engine.is_socket_taken(&back(), &SocketName::new("Back_Socket")));
    let actor = engine.attached_actor(&item_id).unwrap();
    assert_eq!(scene.socket_of(actor), Some(&SocketName::new("Hand_L")));
}

#[test]
fn handler_order_in_the_slot_decides_who_wins() {
    // table lists SceneNode before Actor; an item carrying both fragments
    // ends up with the scene-node representation
    let mut catalog = DefinitionCatalog::new();
    let both: ItemDefId = catalog.register(
        ItemDefinition::new("charm")
            .with_fragment(Fragment::SceneNodeAttachment(SceneNodeAttachmentFragment {
                asset: AssetRef::new("meshes/charm"),
            }))
            .with_fragment(Fragment::ActorAttachment(ActorAttachmentFragment {
                actor: AssetRef::new("actors/charm"),
            })),
    );

    let mut store = MemoryItemStore::new();
    let mut entry = ItemEntry::new(both);
    entry.slot_id = Some(back());
    let item_id = store.insert(entry);

    let mut scene = SceneGraph::new();
    let mut engine = AttachmentEngine::new(back_table(), EngineSettings::default());
    engine.on_item_added_to_slot(&store, &catalog, &mut scene, &back(), item_id);

    assert!(engine.attached_actor(&item_id).is_none());
    assert_eq!(
        engine
            .find_attached_objects_of_kind(&both, itemrig::RepresentationKind::SceneNode)
            .len(),
        1
    );
}
