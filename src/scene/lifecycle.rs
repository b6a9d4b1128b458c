use std::collections::{BTreeMap, BTreeSet};

use crate::{
    foundation::{
        core::{Rgb, Viewport},
        error::{RoomError, RoomResult},
    },
    schedule::{FrameToken, Scheduler},
    scene::{
        camera::PerspectiveCamera,
        raster::{DrawItem, Lighting, RasterStats, rasterize},
        resources::{ResourceRegistry, ResourceStats},
        target::{CpuContextFactory, RenderContextFactory, RenderTarget, dims},
    },
    theme::mode::ThemeMode,
};

/// Content hosted by a [`SceneLifecycleManager`].
pub trait SceneContent {
    /// Creates every disposable resource the content draws with. Called on mount and on
    /// rebuild, always against an empty registry.
    fn setup(
        &mut self,
        resources: &mut ResourceRegistry,
        camera: &mut PerspectiveCamera,
        theme: ThemeMode,
    ) -> RoomResult<()>;

    fn collect(&self, out: &mut Vec<DrawItem>);

    fn lighting(&self) -> Lighting;

    fn clear_color(&self) -> Option<Rgb> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

/// Scheduled per-frame callback for one scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest(pub SceneId);

/// Proof of a live mount. Not `Clone`: [`SceneLifecycleManager::unmount`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SceneHandle {
    id: SceneId,
}

impl SceneHandle {
    pub fn id(&self) -> SceneId {
        self.id
    }
}

/// Named rectangular region a scene renders into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub bounds: Viewport,
}

impl Container {
    pub fn new(name: impl Into<String>, bounds: Viewport) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// Mutable view of a live scene, handed out per frame.
pub struct SceneParts<'a, S> {
    pub content: &'a mut S,
    pub resources: &'a mut ResourceRegistry,
    pub camera: &'a mut PerspectiveCamera,
}

struct MountedScene<S> {
    container: String,
    content: S,
    target: RenderTarget,
    camera: PerspectiveCamera,
    resources: ResourceRegistry,
    frame: Option<FrameToken>,
}

/// Binds containers to render target + camera + frame loop, with paired create/dispose.
pub struct SceneLifecycleManager<S: SceneContent> {
    factory: Box<dyn RenderContextFactory>,
    scenes: BTreeMap<SceneId, MountedScene<S>>,
    observers: BTreeMap<String, BTreeSet<SceneId>>,
    next_id: u64,
    // Counters of resources owned by scenes that are gone.
    retired: ResourceStats,
    targets_allocated: u64,
    targets_released: u64,
}

impl<S: SceneContent> Default for SceneLifecycleManager<S> {
    fn default() -> Self {
        Self::new(CpuContextFactory)
    }
}

impl<S: SceneContent> SceneLifecycleManager<S> {
    pub fn new(factory: impl RenderContextFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            scenes: BTreeMap::new(),
            observers: BTreeMap::new(),
            next_id: 0,
            retired: ResourceStats::default(),
            targets_allocated: 0,
            targets_released: 0,
        }
    }

    pub fn is_mounted(&self, id: SceneId) -> bool {
        self.scenes.contains_key(&id)
    }

    pub fn mounted_count(&self) -> usize {
        self.scenes.len()
    }

    /// Counters across every scene this manager has hosted.
    pub fn stats(&self) -> ResourceStats {
        let mut st = self.retired;
        for scene in self.scenes.values() {
            st.absorb(scene.resources.stats());
        }
        st.targets_allocated = self.targets_allocated;
        st.targets_released = self.targets_released;
        st
    }

    #[tracing::instrument(skip(self, content, sched), fields(container = %container.name))]
    pub fn mount<E>(
        &mut self,
        container: &Container,
        mut content: S,
        theme: ThemeMode,
        sched: &mut Scheduler<E>,
    ) -> RoomResult<SceneHandle>
    where
        E: From<FrameRequest>,
    {
        let target = self
            .factory
            .create_target(container.bounds)
            .map_err(|err| match err {
                RoomError::SceneInit(_) => err,
                other => RoomError::scene_init(other.to_string()),
            })?;
        self.targets_allocated += 1;

        let mut camera = PerspectiveCamera::new(50.0, container.bounds.aspect(), 0.1, 1000.0);
        let mut resources = ResourceRegistry::new();
        if let Err(err) = content.setup(&mut resources, &mut camera, theme) {
            resources.dispose_all();
            self.retired.absorb(resources.stats());
            drop(target);
            self.targets_released += 1;
            tracing::warn!(%err, "scene setup failed; partial resources released");
            return Err(RoomError::scene_init(format!("scene setup failed: {err}")));
        }

        let id = SceneId(self.next_id);
        self.next_id += 1;
        let frame = sched.request_frame(E::from(FrameRequest(id)));
        self.observers
            .entry(container.name.clone())
            .or_default()
            .insert(id);
        tracing::debug!(
            scene = id.0,
            width = container.bounds.width,
            height = container.bounds.height,
            resources = resources.live_count(),
            "scene mounted"
        );
        self.scenes.insert(
            id,
            MountedScene {
                container: container.name.clone(),
                content,
                target,
                camera,
                resources,
                frame: Some(frame),
            },
        );
        Ok(SceneHandle { id })
    }

    /// Tears the scene down: frame loop, resize observer, target, then every resource.
    ///
    /// Returns `None` for a handle minted by another manager.
    #[tracing::instrument(skip(self, sched), fields(scene = handle.id.0))]
    pub fn unmount<E>(&mut self, handle: SceneHandle, sched: &mut Scheduler<E>) -> Option<S> {
        let Some(mut scene) = self.scenes.remove(&handle.id) else {
            tracing::warn!("unmount of a scene this manager does not host");
            return None;
        };
        if let Some(token) = scene.frame.take() {
            sched.cancel_frame(token);
        }
        self.detach_observer(&scene.container, handle.id);
        drop(scene.target);
        self.targets_released += 1;
        let released = scene.resources.dispose_all();
        self.retired.absorb(scene.resources.stats());
        tracing::debug!(released, "scene unmounted");
        Some(scene.content)
    }

    fn detach_observer(&mut self, container: &str, id: SceneId) {
        if let Some(set) = self.observers.get_mut(container) {
            set.remove(&id);
            if set.is_empty() {
                self.observers.remove(container);
            }
        }
    }

    /// Called when a scene's frame request fires. Re-arms the loop and returns the scene, or
    /// `None` for a request whose scene is gone.
    pub fn frame_fired<E>(&mut self, id: SceneId, sched: &mut Scheduler<E>) -> Option<SceneParts<'_, S>>
    where
        E: From<FrameRequest>,
    {
        let Some(scene) = self.scenes.get_mut(&id) else {
            tracing::trace!(scene = id.0, "dropping stale frame callback");
            return None;
        };
        scene.frame = Some(sched.request_frame(E::from(FrameRequest(id))));
        Some(SceneParts {
            content: &mut scene.content,
            resources: &mut scene.resources,
            camera: &mut scene.camera,
        })
    }

    pub fn scene(&self, handle: &SceneHandle) -> Option<&S> {
        self.scenes.get(&handle.id).map(|s| &s.content)
    }

    pub fn scene_mut(&mut self, handle: &SceneHandle) -> Option<SceneParts<'_, S>> {
        let scene = self.scenes.get_mut(&handle.id)?;
        Some(SceneParts {
            content: &mut scene.content,
            resources: &mut scene.resources,
            camera: &mut scene.camera,
        })
    }

    pub fn resources(&self, handle: &SceneHandle) -> Option<&ResourceRegistry> {
        self.scenes.get(&handle.id).map(|s| &s.resources)
    }

    pub fn camera(&self, handle: &SceneHandle) -> Option<&PerspectiveCamera> {
        self.scenes.get(&handle.id).map(|s| &s.camera)
    }

    pub fn target(&self, handle: &SceneHandle) -> Option<&RenderTarget> {
        self.scenes.get(&handle.id).map(|s| &s.target)
    }

    pub fn render(&mut self, handle: &SceneHandle) -> RoomResult<RasterStats> {
        let scene = self
            .scenes
            .get_mut(&handle.id)
            .ok_or_else(|| RoomError::validation("render on an unmounted scene"))?;
        let mut items = Vec::new();
        scene.content.collect(&mut items);
        let lighting = scene.content.lighting();
        let clear = scene.content.clear_color();
        Ok(rasterize(
            &mut scene.target,
            &scene.camera,
            &scene.resources,
            &items,
            &lighting,
            clear,
        ))
    }

    /// Re-fits every scene observing `container`. Returns how many scenes were resized.
    /// An unusable size is rejected before any scene is touched.
    pub fn on_resize(&mut self, container: &str, width: u32, height: u32) -> RoomResult<usize> {
        let viewport = Viewport::new(width, height)?;
        dims(viewport)?;
        let Some(ids) = self.observers.get(container) else {
            return Ok(0);
        };
        let mut n = 0;
        for id in ids {
            let Some(scene) = self.scenes.get_mut(id) else {
                continue;
            };
            scene.camera.set_aspect(viewport.aspect());
            scene.target.resize(viewport)?;
            self.targets_released += 1;
            self.targets_allocated += 1;
            n += 1;
        }
        tracing::debug!(container, width, height, scenes = n, "container resized");
        Ok(n)
    }

    /// Hot-swaps the scene's resources: disposes everything and runs setup again.
    pub fn rebuild(&mut self, handle: &SceneHandle, theme: ThemeMode) -> RoomResult<()> {
        let scene = self
            .scenes
            .get_mut(&handle.id)
            .ok_or_else(|| RoomError::validation("rebuild on an unmounted scene"))?;
        let released = scene.resources.dispose_all();
        scene
            .content
            .setup(&mut scene.resources, &mut scene.camera, theme)?;
        tracing::debug!(
            scene = handle.id.0,
            released,
            created = scene.resources.live_count(),
            %theme,
            "scene rebuilt"
        );
        Ok(())
    }
}

impl<S: SceneContent> Drop for SceneLifecycleManager<S> {
    fn drop(&mut self) {
        if self.scenes.is_empty() {
            return;
        }
        tracing::warn!(
            leaked = self.scenes.len(),
            "scene manager dropped with mounted scenes; releasing"
        );
        for (_, mut scene) in std::mem::take(&mut self.scenes) {
            scene.resources.dispose_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        foundation::core::{Affine3, Millis},
        scene::resources::{Geometry, Material},
    };

    #[derive(Default)]
    struct Quad {
        fail_setup: bool,
        items: Vec<DrawItem>,
    }

    impl SceneContent for Quad {
        fn setup(
            &mut self,
            resources: &mut ResourceRegistry,
            _camera: &mut PerspectiveCamera,
            theme: ThemeMode,
        ) -> RoomResult<()> {
            let g = resources.create_geometry(Geometry::Plane {
                width: 2.0,
                height: 2.0,
            });
            if self.fail_setup {
                return Err(RoomError::validation("no geometry for you"));
            }
            let color = if theme.is_dark() {
                Rgb::hex(0x222222)
            } else {
                Rgb::hex(0xFFFFFF)
            };
            let m = resources.create_material(Material::basic(color, 1.0));
            self.items = vec![DrawItem {
                geometry: g,
                material: m,
                world: Affine3::IDENTITY,
            }];
            Ok(())
        }

        fn collect(&self, out: &mut Vec<DrawItem>) {
            out.extend_from_slice(&self.items);
        }

        fn lighting(&self) -> Lighting {
            Lighting::default()
        }
    }

    struct NoContext;

    impl RenderContextFactory for NoContext {
        fn create_target(&mut self, _viewport: Viewport) -> RoomResult<RenderTarget> {
            Err(RoomError::scene_init("rendering context unavailable"))
        }
    }

    fn container(w: u32, h: u32) -> Container {
        Container::new("room", Viewport::new(w, h).unwrap())
    }

    #[test]
    fn mount_unmount_is_symmetric() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr = SceneLifecycleManager::default();
        for _ in 0..3 {
            let h = mgr
                .mount(&container(16, 16), Quad::default(), ThemeMode::Light, &mut sched)
                .unwrap();
            assert_eq!(sched.pending_frames(), 1);
            assert_eq!(mgr.stats().live_materials(), 1);
            mgr.unmount(h, &mut sched);
            assert_eq!(sched.pending_frames(), 0);
        }
        let st = mgr.stats();
        assert!(st.is_balanced());
        assert_eq!(st.targets_allocated, 3);
        assert_eq!(st.geometries_created, 3);
    }

    #[test]
    fn missing_context_is_reported() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr: SceneLifecycleManager<Quad> = SceneLifecycleManager::new(NoContext);
        let err = mgr
            .mount(&container(16, 16), Quad::default(), ThemeMode::Light, &mut sched)
            .unwrap_err();
        assert!(matches!(err, RoomError::SceneInit(_)));
        assert_eq!(mgr.mounted_count(), 0);
        assert_eq!(sched.pending_frames(), 0);
    }

    #[test]
    fn failed_setup_releases_partial_resources() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr = SceneLifecycleManager::default();
        let content = Quad {
            fail_setup: true,
            ..Quad::default()
        };
        let err = mgr
            .mount(&container(16, 16), content, ThemeMode::Dark, &mut sched)
            .unwrap_err();
        assert!(matches!(err, RoomError::SceneInit(_)));
        let st = mgr.stats();
        assert_eq!(st.geometries_created, 1);
        assert!(st.is_balanced());
    }

    #[test]
    fn frame_loop_rearms_until_unmount() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr = SceneLifecycleManager::default();
        let h = mgr
            .mount(&container(8, 8), Quad::default(), ThemeMode::Light, &mut sched)
            .unwrap();
        let id = h.id();

        let mut frames = 0;
        while let Some(f) = sched.pop_due(Millis(160)) {
            assert_eq!(f.event, FrameRequest(id));
            assert!(mgr.frame_fired(f.event.0, &mut sched).is_some());
            frames += 1;
        }
        assert_eq!(frames, 10);

        mgr.unmount(h, &mut sched);
        assert!(mgr.frame_fired(id, &mut sched).is_none());
        assert_eq!(sched.pending_frames(), 0);
    }

    #[test]
    fn resize_refits_camera_and_target() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr = SceneLifecycleManager::default();
        let h = mgr
            .mount(&container(10, 10), Quad::default(), ThemeMode::Light, &mut sched)
            .unwrap();
        let live_before = mgr.stats().live_targets();

        assert_eq!(mgr.on_resize("room", 40, 20).unwrap(), 1);
        assert_eq!(mgr.on_resize("elsewhere", 40, 20).unwrap(), 0);
        assert_eq!(mgr.camera(&h).unwrap().aspect, 2.0);
        assert_eq!(mgr.target(&h).unwrap().viewport(), Viewport::new(40, 20).unwrap());
        assert_eq!(mgr.stats().live_targets(), live_before);
        assert!(mgr.on_resize("room", 0, 20).is_err());
        assert!(matches!(
            mgr.on_resize("room", 70_000, 20),
            Err(RoomError::SceneInit(_))
        ));
        assert_eq!(mgr.camera(&h).unwrap().aspect, 2.0);
        assert_eq!(mgr.target(&h).unwrap().viewport(), Viewport::new(40, 20).unwrap());

        mgr.unmount(h, &mut sched);
        assert_eq!(mgr.on_resize("room", 40, 20).unwrap(), 0);
        assert!(mgr.stats().is_balanced());
    }

    #[test]
    fn rebuild_disposes_before_recreating() {
        let mut sched: Scheduler<FrameRequest> = Scheduler::new(Millis(16));
        let mut mgr = SceneLifecycleManager::default();
        let h = mgr
            .mount(&container(8, 8), Quad::default(), ThemeMode::Light, &mut sched)
            .unwrap();
        mgr.rebuild(&h, ThemeMode::Dark).unwrap();
        let st = mgr.stats();
        assert_eq!(st.materials_created, 2);
        assert_eq!(st.live_materials(), 1);
        let res = mgr.resources(&h).unwrap();
        assert_eq!(res.live_count(), 2);

        mgr.render(&h).unwrap();
        assert_eq!(mgr.target(&h).unwrap().pixel(4, 4), Some([0x22, 0x22, 0x22, 255]));
        mgr.unmount(h, &mut sched);
        assert!(mgr.stats().is_balanced());
    }
}
