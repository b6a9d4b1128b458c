use roomlight::{
    Container, FrameRequest, Millis, RoomResult, RoomScene, SceneContent, SceneLifecycleManager,
    Scheduler, ThemeMode, Viewport,
    ambient::ParticleField,
    scene::{
        camera::PerspectiveCamera,
        raster::{DrawItem, Lighting},
        resources::ResourceRegistry,
        target::{RenderContextFactory, RenderTarget},
    },
};

fn container(name: &str, w: u32, h: u32) -> Container {
    Container::new(name, Viewport::new(w, h).unwrap())
}

fn drain(sched: &mut Scheduler<FrameRequest>, mgr: &mut SceneLifecycleManager<RoomScene>, until: u64) -> usize {
    let mut served = 0;
    while let Some(f) = sched.pop_due(Millis(until)) {
        if let Some(parts) = mgr.frame_fired(f.event.0, sched) {
            parts.content.sway(f.at);
            served += 1;
        }
    }
    sched.advance_to(Millis(until));
    served
}

#[test]
fn repeated_mount_cycles_leave_nothing_behind() {
    let mut sched = Scheduler::new(Millis(16));
    let mut mgr = SceneLifecycleManager::default();
    for i in 0..5u64 {
        let theme = if i % 2 == 0 { ThemeMode::Light } else { ThemeMode::Dark };
        let h = mgr
            .mount(&container("room", 24, 24), RoomScene::default(), theme, &mut sched)
            .unwrap();
        drain(&mut sched, &mut mgr, (i + 1) * 100);
        mgr.render(&h).unwrap();
        mgr.on_resize("room", 30, 20).unwrap();
        mgr.rebuild(&h, theme.toggled()).unwrap();
        mgr.unmount(h, &mut sched);
    }
    let st = mgr.stats();
    assert!(st.is_balanced(), "{st:?}");
    assert_eq!(st.targets_allocated, st.targets_released);
    assert_eq!(sched.pending_frames(), 0);
}

#[test]
fn two_scenes_share_a_container_and_resize_together() {
    let mut sched = Scheduler::new(Millis(16));
    let mut mgr = SceneLifecycleManager::default();
    let a = mgr
        .mount(&container("shared", 40, 40), RoomScene::default(), ThemeMode::Light, &mut sched)
        .unwrap();
    let b = mgr
        .mount(&container("shared", 40, 40), RoomScene::default(), ThemeMode::Dark, &mut sched)
        .unwrap();
    assert_eq!(mgr.on_resize("shared", 80, 40).unwrap(), 2);
    assert_eq!(mgr.camera(&a).unwrap().aspect, 2.0);
    assert_eq!(mgr.camera(&b).unwrap().aspect, 2.0);

    // One frame per scene per tick.
    assert_eq!(drain(&mut sched, &mut mgr, 16), 2);

    let id_a = a.id();
    mgr.unmount(a, &mut sched);
    assert!(!mgr.is_mounted(id_a));
    assert_eq!(drain(&mut sched, &mut mgr, 32), 1);
    mgr.unmount(b, &mut sched);
    assert!(mgr.stats().is_balanced());
}

#[test]
fn rendered_room_is_not_blank() {
    let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
    let mut mgr = SceneLifecycleManager::default();
    let h = mgr
        .mount(&container("room", 64, 64), RoomScene::default(), ThemeMode::Dark, &mut sched)
        .unwrap();
    let stats = mgr.render(&h).unwrap();
    assert!(stats.faces_drawn > 20);
    let frame = mgr.target(&h).unwrap().to_frame();
    let covered = frame.data.chunks_exact(4).filter(|px| px[3] > 0).count();
    assert!(covered > 64 * 64 / 4, "only {covered} pixels drawn");
    mgr.unmount(h, &mut sched);
}

struct Exploding;

impl SceneContent for Exploding {
    fn setup(
        &mut self,
        resources: &mut ResourceRegistry,
        _camera: &mut PerspectiveCamera,
        _theme: ThemeMode,
    ) -> RoomResult<()> {
        let mut room = RoomScene::default();
        let mut cam = PerspectiveCamera::new(50.0, 1.0, 0.1, 1000.0);
        room.setup(resources, &mut cam, ThemeMode::Light)?;
        Err(roomlight::RoomError::validation("halfway"))
    }

    fn collect(&self, _out: &mut Vec<DrawItem>) {}

    fn lighting(&self) -> Lighting {
        Lighting::default()
    }
}

#[test]
fn failed_setup_releases_everything_it_made() {
    let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
    let mut mgr = SceneLifecycleManager::default();
    let err = mgr
        .mount(&container("room", 16, 16), Exploding, ThemeMode::Dark, &mut sched)
        .unwrap_err();
    assert!(matches!(err, roomlight::RoomError::SceneInit(_)));
    let st = mgr.stats();
    assert!(st.geometries_created > 0);
    assert!(st.is_balanced());
    assert_eq!(mgr.mounted_count(), 0);
    assert_eq!(sched.pending_frames(), 0);
}

struct Headless;

impl RenderContextFactory for Headless {
    fn create_target(&mut self, _viewport: Viewport) -> RoomResult<RenderTarget> {
        Err(roomlight::RoomError::scene_init("no rendering context"))
    }
}

#[test]
fn missing_context_fails_mount_cleanly() {
    let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
    let mut mgr: SceneLifecycleManager<ParticleField> = SceneLifecycleManager::new(Headless);
    assert!(
        mgr.mount(&container("bg", 16, 16), ParticleField::default(), ThemeMode::Dark, &mut sched)
            .is_err()
    );
    assert!(mgr.stats().is_balanced());
}
