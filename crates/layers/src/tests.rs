use std::rc::Rc;
use std::sync::Arc;

use geometry::{Color, LayerIntRect, LayerIntSize, LayerPixel, Region, ScreenIntSize, int_rect, rect_area};
use picture::{LayerCommit, LayerId, Picture};
use tiles::{ResourceId, TileDrawingInfo, TileResolution, Tiling};

use super::*;

const CELL_SIZE: i32 = 256;

fn tree_state() -> TreeState {
    TreeState {
        device_viewport_size: ScreenIntSize::new(1000, 1000),
        frame_time_in_seconds: 1.0,
        ..TreeState::default()
    }
}

fn at_page_scale(page_scale: f32) -> TreeState {
    TreeState {
        total_page_scale_factor: page_scale,
        ..tree_state()
    }
}

fn recorded_picture(width: i32, height: i32) -> Arc<Picture> {
    Picture::fully_recorded(
        LayerIntSize::new(width, height),
        LayerIntSize::new(CELL_SIZE, CELL_SIZE),
        0.0625,
        true,
    )
    .expect("fully recorded picture")
}

fn commit(width: i32, height: i32, picture: Arc<Picture>) -> LayerCommit {
    LayerCommit {
        id: LayerId(1),
        bounds: LayerIntSize::new(width, height),
        picture,
        invalidation: Region::new(),
        draws_content: true,
        contents_opaque: false,
        is_mask: false,
        background_color: Color::WHITE,
    }
}

fn pending_layer_with(settings: LayerTreeSettings, commit: LayerCommit) -> PictureLayer {
    let mut layer = PictureLayer::new(commit.id, TreeKind::Pending, settings);
    layer.apply_commit(commit);
    layer
}

fn pending_layer(width: i32, height: i32) -> PictureLayer {
    pending_layer_with(
        LayerTreeSettings::default(),
        commit(width, height, recorded_picture(width, height)),
    )
}

fn visible(layer: &mut PictureLayer, rect: LayerIntRect) {
    layer.set_draw_properties(LayerDrawProperties {
        visible_layer_rect: rect,
        ..LayerDrawProperties::default()
    });
}

fn activate(pending: &mut PictureLayer) -> PictureLayer {
    let mut active = pending.create_twin();
    pending.push_properties_to(&mut active);
    active.did_become_active();
    active
}

fn resolutions(layer: &PictureLayer) -> Vec<(f32, TileResolution)> {
    layer
        .tilings()
        .iter()
        .map(|tiling| (tiling.contents_scale(), tiling.resolution()))
        .collect()
}

fn high_res_count(layer: &PictureLayer) -> usize {
    layer
        .tilings()
        .iter()
        .filter(|tiling| tiling.resolution() == TileResolution::High)
        .count()
}

fn mark_ready(tiling: &Tiling) {
    for (index, tile) in tiling.tiles().enumerate() {
        tile.borrow_mut().set_drawing_info(TileDrawingInfo::Resource {
            resource_id: ResourceId(index as u64 + 1),
            contents_swizzled: false,
        });
    }
}

fn required_tiles(tiling: &Tiling) -> usize {
    tiling
        .tiles()
        .filter(|tile| tile.borrow().is_required_for_activation())
        .count()
}

#[test]
fn first_update_creates_high_and_low_res_tilings() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);

    assert_eq!(
        resolutions(&layer),
        vec![(1.0, TileResolution::High), (0.125, TileResolution::Low)]
    );
    let scales = layer.scales();
    assert_eq!(scales.raster_contents_scale, 1.0);
    assert_eq!(scales.low_res_raster_contents_scale, 0.125);
    assert_eq!(scales.raster_page_scale, 1.0);
    assert_eq!(scales.raster_source_scale, 1.0);
    assert_eq!(layer.contents_scale(), 1.0);
    assert_eq!(layer.content_bounds(), geometry::ContentIntSize::new(1000, 1000));
}

#[test]
fn exactly_one_high_res_tiling_after_every_update() {
    let mut layer = pending_layer(1000, 1000);
    for ideal in [1.0, 2.0, 0.5, 1.3, 2.0, 0.07] {
        layer.calculate_contents_scale(&at_page_scale(ideal), ideal, false, None);
        assert_eq!(high_res_count(&layer), 1, "ideal scale {ideal}");
        let raster = layer.scales().raster_contents_scale;
        assert_eq!(
            layer.tilings().scale_with_resolution(TileResolution::High),
            Some(raster)
        );
    }
}

#[test]
fn repeated_update_with_same_inputs_changes_nothing() {
    let mut layer = pending_layer(1000, 1000);
    let tree = at_page_scale(1.5);
    layer.calculate_contents_scale(&tree, 1.5, false, None);
    let tags = resolutions(&layer);
    let scales = layer.scales();

    layer.calculate_contents_scale(&tree, 1.5, false, None);

    assert_eq!(resolutions(&layer), tags);
    assert_eq!(layer.scales(), scales);
}

#[test]
fn empty_picture_gets_no_tilings() {
    let mut layer = pending_layer_with(
        LayerTreeSettings::default(),
        commit(500, 500, Picture::empty(true)),
    );
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    assert!(layer.tilings().is_empty());
    assert_eq!(layer.scales().raster_contents_scale, 0.0);
}

#[test]
fn layer_without_content_ignores_scale_updates() {
    let mut without_content = commit(500, 500, recorded_picture(500, 500));
    without_content.draws_content = false;
    let mut layer = pending_layer_with(LayerTreeSettings::default(), without_content);
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    assert!(layer.tilings().is_empty());
    assert_eq!(layer.scales().ideal_contents_scale, 0.0);
}

#[test]
fn never_policy_creates_no_low_res_tiling() {
    let settings = LayerTreeSettings {
        low_res_tiling_policy: LowResTilingPolicy::Never,
        ..LayerTreeSettings::default()
    };
    let mut layer = pending_layer_with(settings, commit(1000, 1000, recorded_picture(1000, 1000)));
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    assert_eq!(resolutions(&layer), vec![(1.0, TileResolution::High)]);
}

#[test]
fn animating_layer_creates_no_low_res_tiling() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 1.0, true, None);
    assert_eq!(resolutions(&layer), vec![(1.0, TileResolution::High)]);
}

#[test]
fn animating_scale_is_not_rastered_below_page_scale() {
    let mut layer = pending_layer(1000, 1000);
    let tree = TreeState {
        total_page_scale_factor: 2.0,
        ..tree_state()
    };
    layer.calculate_contents_scale(&tree, 0.5, true, None);
    assert_eq!(layer.scales().raster_contents_scale, 2.0);
}

#[test]
fn ideal_scale_is_clamped_to_minimum() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 0.01, false, None);
    assert_eq!(layer.scales().ideal_contents_scale, 0.0625);
    assert_eq!(layer.contents_scale(), 0.0625);
    assert_eq!(resolutions(&layer), vec![(0.0625, TileResolution::High)]);
}

#[test]
fn pinch_zoom_out_divides_raster_scale() {
    let zoomed_in = at_page_scale(2.0);
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&zoomed_in, 2.0, false, None);
    let mut active = activate(&mut pending);
    assert_eq!(
        resolutions(&active),
        vec![(2.0, TileResolution::High), (0.25, TileResolution::Low)]
    );

    let pinching = TreeState {
        total_page_scale_factor: 1.5,
        pinch_gesture_active: true,
        ..tree_state()
    };
    assert!(active.should_adjust_raster_scale(&pinching, false));
    active.calculate_contents_scale(&pinching, 1.5, false, None);

    assert_eq!(active.scales().raster_contents_scale, 0.125);
    assert_eq!(active.scales().raster_page_scale, 0.125);
    // No low-res tiling mid-gesture; the previous one keeps its tag.
    assert_eq!(
        resolutions(&active),
        vec![
            (2.0, TileResolution::NonIdeal),
            (0.25, TileResolution::Low),
            (0.125, TileResolution::High),
        ]
    );
    assert_eq!(active.contents_scale(), 2.0);
}

#[test]
fn pinch_zoom_in_jumps_when_too_far_from_ideal() {
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree_state(), 0.25, false, None);
    let mut active = activate(&mut pending);
    assert_eq!(active.scales().raster_page_scale, 1.0);

    let pinching = TreeState {
        total_page_scale_factor: 5.0,
        pinch_gesture_active: true,
        ..tree_state()
    };
    active.calculate_contents_scale(&pinching, 5.0, false, None);
    assert_eq!(active.scales().raster_contents_scale, 0.25);

    let further = TreeState {
        total_page_scale_factor: 17.0,
        double_tap_active: true,
        ..tree_state()
    };
    active.calculate_contents_scale(&further, 17.0, false, None);
    assert_eq!(active.scales().raster_contents_scale, 4.0);
    assert_eq!(high_res_count(&active), 1);
}

#[test]
fn pinch_snaps_to_nearby_tiling() {
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&at_page_scale(0.9), 0.9, false, None);
    pending.calculate_contents_scale(&at_page_scale(16.0), 16.0, false, None);
    let mut active = activate(&mut pending);

    // 16 / 16 = 1.0 lands within the snapping ratio of 0.9.
    let pinching = TreeState {
        total_page_scale_factor: 8.0,
        pinch_gesture_active: true,
        ..tree_state()
    };
    active.calculate_contents_scale(&pinching, 8.0, false, None);
    assert_eq!(active.scales().raster_contents_scale, 0.9);
    assert_eq!(
        active.tilings().scale_with_resolution(TileResolution::High),
        Some(0.9)
    );
}

#[test]
fn pending_layer_keeps_raster_scale_during_pinch() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);

    let pinching = TreeState {
        total_page_scale_factor: 1.5,
        pinch_gesture_active: true,
        ..tree_state()
    };
    assert!(!layer.should_adjust_raster_scale(&pinching, false));
    layer.calculate_contents_scale(&pinching, 1.5, false, None);
    assert_eq!(layer.scales().raster_contents_scale, 1.0);
    assert_eq!(layer.tilings().num_tilings(), 2);
}

#[test]
fn device_scale_change_rescales_even_while_pinching() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    let pinching_hidpi = TreeState {
        device_scale_factor: 2.0,
        pinch_gesture_active: true,
        ..tree_state()
    };
    layer.calculate_contents_scale(&pinching_hidpi, 2.0, false, None);
    assert_eq!(layer.scales().raster_device_scale, 2.0);
    assert_eq!(layer.scales().raster_source_scale, 1.0);
    assert_eq!(high_res_count(&layer), 1);
}

#[test]
fn source_scale_change_alone_keeps_raster_scale() {
    let mut layer = pending_layer(1000, 1000);
    let tree = tree_state();
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    layer.calculate_contents_scale(&tree, 2.0, false, None);
    assert_eq!(layer.scales().ideal_contents_scale, 2.0);
    assert_eq!(layer.scales().raster_contents_scale, 1.0);
    assert_eq!(layer.tilings().scales(), vec![1.0, 0.125]);
}

#[test]
fn end_of_animation_rescales_active_layer() {
    let mut pending = pending_layer(1000, 1000);
    let tree = tree_state();
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);

    active.calculate_contents_scale(&tree, 1.0, true, None);
    assert!(active.raster_source_scale_was_animating());
    assert!(active.should_adjust_raster_scale(&tree, false));

    active.calculate_contents_scale(&tree, 1.0, false, None);
    assert!(!active.raster_source_scale_was_animating());
    assert!(!active.should_adjust_raster_scale(&tree, false));
}

#[test]
fn minimum_contents_scale_never_drops_as_layer_shrinks() {
    let mut previous = 0.0;
    for size in (1..=2000).rev().step_by(37) {
        let scale = minimum_contents_scale(LayerIntSize::new(size, 3 * size), 0.0625);
        assert!(scale >= previous, "size {size}: {scale} < {previous}");
        assert!(scale * size as f32 >= 1.0 - f32::EPSILON || scale == 0.0625);
        previous = scale;
    }
}

#[test]
#[should_panic(expected = "below the minimum contents scale")]
fn adding_tiling_below_minimum_panics() {
    let mut layer = pending_layer(1000, 1000);
    layer.add_tiling(&tree_state(), 0.01, None);
}

#[test]
fn added_tiling_is_mirrored_on_twin() {
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree_state(), 1.0, false, None);
    let mut active = activate(&mut pending);
    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(1000, 1000, Arc::clone(active.picture())));
    next_pending.sync_from_active_layer(&tree_state(), &active);

    active.add_tiling(&tree_state(), 3.0, Some(&mut next_pending));

    assert!(active.tilings().tiling_at_scale(3.0).is_some());
    assert_eq!(
        next_pending.tilings().tiling_at_scale(3.0).map(Tiling::resolution),
        Some(TileResolution::NonIdeal)
    );
}

#[test]
fn sync_from_active_matches_scales_and_tags() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&at_page_scale(2.0), 2.0, false, None);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let active = activate(&mut pending);

    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(1000, 1000, Arc::clone(active.picture())));
    next_pending.sync_from_active_layer(&tree, &active);
    let first = resolutions(&next_pending);
    assert_eq!(first, resolutions(&active));
    assert_eq!(next_pending.scales().raster_contents_scale, 1.0);
    assert_eq!(next_pending.scales().low_res_raster_contents_scale, 0.125);

    next_pending.sync_from_active_layer(&tree, &active);
    assert_eq!(resolutions(&next_pending), first);
}

#[test]
fn sync_skips_tilings_below_new_minimum() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let active = activate(&mut pending);

    // 5px high: nothing below 0.2 keeps a whole pixel.
    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(1000, 5, recorded_picture(1000, 5)));
    next_pending.sync_from_active_layer(&tree, &active);
    assert_eq!(next_pending.tilings().scales(), vec![1.0]);
}

#[test]
fn sync_invalidates_dropped_recordings_and_exposed_area() {
    let tree = tree_state();
    let mut pending = pending_layer(512, 512);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let active = activate(&mut pending);

    let partial = Picture::with_recorded_cells(
        LayerIntSize::new(768, 512),
        LayerIntSize::new(CELL_SIZE, CELL_SIZE),
        0.0625,
        true,
        [(0, 0), (2, 0), (0, 1), (1, 1), (2, 1)],
    )
    .expect("partially recorded picture");
    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(768, 512, partial));
    next_pending.sync_from_active_layer(&tree, &active);

    let invalidation = next_pending.invalidation();
    let dropped: LayerIntRect = int_rect(256, 0, 256, 256);
    let exposed: LayerIntRect = int_rect(512, 0, 256, 512);
    assert!(invalidation.contains_rect(dropped));
    assert!(invalidation.contains_rect(exposed));
    assert_eq!(invalidation.area(), rect_area(dropped) + rect_area(exposed));
}

#[test]
fn second_sync_from_active_changes_nothing() {
    let tree = tree_state();
    let mut pending = pending_layer(512, 512);
    pending.calculate_contents_scale(&at_page_scale(2.0), 2.0, false, None);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let active = activate(&mut pending);

    let partial = Picture::with_recorded_cells(
        LayerIntSize::new(768, 512),
        LayerIntSize::new(CELL_SIZE, CELL_SIZE),
        0.0625,
        true,
        [(0, 0), (2, 0), (0, 1), (1, 1), (2, 1)],
    )
    .expect("partially recorded picture");
    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(768, 512, partial));
    next_pending.sync_from_active_layer(&tree, &active);
    let first_scales = next_pending.tilings().scales();
    let first_resolutions = resolutions(&next_pending);
    let first_invalidation = next_pending.invalidation().clone();
    assert!(!first_invalidation.is_empty());
    assert_eq!(first_scales, active.tilings().scales());

    next_pending.sync_from_active_layer(&tree, &active);
    assert_eq!(next_pending.tilings().scales(), first_scales);
    assert_eq!(resolutions(&next_pending), first_resolutions);
    assert_eq!(next_pending.invalidation().area(), first_invalidation.area());
    assert_eq!(next_pending.invalidation(), &first_invalidation);
}

#[test]
fn pending_shares_tiles_outside_invalidation() {
    let tree = tree_state();
    let everything: LayerIntRect = int_rect(0, 0, 1000, 1000);
    let mut pending = pending_layer(1000, 1000);
    visible(&mut pending, everything);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    pending.update_tile_priorities(&tree, None);
    let active = activate(&mut pending);

    let mut next_commit = commit(1000, 1000, Arc::clone(active.picture()));
    next_commit.invalidation = Region::from(int_rect::<LayerPixel>(0, 0, 100, 100));
    let mut next_pending = active.create_twin();
    next_pending.apply_commit(next_commit);
    next_pending.sync_from_active_layer(&tree, &active);
    visible(&mut next_pending, everything);
    next_pending.update_tile_priorities(&TreeState { frame_time_in_seconds: 2.0, ..tree }, Some(&active));

    let active_tiling = active.tilings().tiling_at_scale(1.0).expect("active high res");
    let pending_tiling = next_pending.tilings().tiling_at_scale(1.0).expect("pending high res");
    let invalidated = (
        active_tiling.tile_at(0, 0).expect("active tile"),
        pending_tiling.tile_at(0, 0).expect("pending tile"),
    );
    let untouched = (
        active_tiling.tile_at(1, 1).expect("active tile"),
        pending_tiling.tile_at(1, 1).expect("pending tile"),
    );
    assert!(!Rc::ptr_eq(invalidated.0, invalidated.1));
    assert!(Rc::ptr_eq(untouched.0, untouched.1));
}

/// High res at 1.0, an acceptable non-ideal tiling at 2.0, low res at 0.125.
fn pending_with_extra_tiling() -> PictureLayer {
    let tree = tree_state();
    let mut layer = pending_layer(1000, 1000);
    visible(&mut layer, int_rect(0, 0, 500, 500));
    layer.calculate_contents_scale(&at_page_scale(2.0), 2.0, false, None);
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    layer.update_tile_priorities(&tree, None);
    assert_eq!(
        resolutions(&layer),
        vec![
            (2.0, TileResolution::NonIdeal),
            (1.0, TileResolution::High),
            (0.25, TileResolution::NonIdeal),
            (0.125, TileResolution::Low),
        ]
    );
    layer
}

#[test]
fn ready_acceptable_tiles_satisfy_activation_alone() {
    let layer = pending_with_extra_tiling();
    let extra = layer.tilings().tiling_at_scale(2.0).expect("extra tiling");
    mark_ready(extra);

    let marked = layer.mark_visible_resources_as_required(None);

    let high_res = layer.tilings().tiling_at_scale(1.0).expect("high res");
    assert_eq!(required_tiles(high_res), 0);
    // 500x500 visible at 2.0 is 4x4 tiles of 256.
    assert_eq!(required_tiles(extra), 16);
    assert_eq!(marked, 16);
}

#[test]
fn high_res_fills_gaps_left_by_acceptable_tiles() {
    let layer = pending_with_extra_tiling();
    let extra = layer.tilings().tiling_at_scale(2.0).expect("extra tiling");
    let corner = extra.tile_at(0, 0).expect("corner tile");
    corner.borrow_mut().set_drawing_info(TileDrawingInfo::SolidColor(Color::WHITE));

    layer.mark_visible_resources_as_required(None);

    let high_res = layer.tilings().tiling_at_scale(1.0).expect("high res");
    assert!(corner.borrow().is_required_for_activation());
    assert_eq!(required_tiles(extra), 1);
    // The corner covers only part of high res tile (0, 0), which stays required.
    assert_eq!(required_tiles(high_res), 4);
    let low_res = layer.tilings().tiling_at_scale(0.125).expect("low res");
    assert_eq!(required_tiles(low_res), 0);
}

#[test]
fn required_tiles_cover_visible_rect() {
    let layer = pending_with_extra_tiling();
    let extra = layer.tilings().tiling_at_scale(2.0).expect("extra tiling");
    for (index, tile) in extra.tiles().enumerate() {
        if index % 3 == 0 {
            tile.borrow_mut().set_drawing_info(TileDrawingInfo::PicturePile);
        }
    }

    layer.mark_visible_resources_as_required(None);

    let mut covered: Region<LayerPixel> = Region::new();
    for tiling in layer.tilings().iter() {
        for tile in tiling.tiles() {
            let tile = tile.borrow();
            if tile.is_required_for_activation() {
                covered.union_rect(geometry::scale_to_enclosing_rect(
                    tile.content_rect(),
                    1.0 / tile.contents_scale(),
                ));
            }
        }
    }
    assert!(covered.contains_rect(int_rect(0, 0, 500, 500)));
}

#[test]
fn marking_again_clears_stale_marks() {
    let layer = pending_with_extra_tiling();
    layer.mark_visible_resources_as_required(None);
    let high_res = layer.tilings().tiling_at_scale(1.0).expect("high res");
    assert_eq!(required_tiles(high_res), 4);

    mark_ready(layer.tilings().tiling_at_scale(2.0).expect("extra tiling"));
    layer.mark_visible_resources_as_required(None);
    assert_eq!(required_tiles(high_res), 0);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "before its priorities were updated")]
fn marking_before_priority_update_panics() {
    let mut layer = pending_layer(1000, 1000);
    visible(&mut layer, int_rect(0, 0, 500, 500));
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    layer.mark_visible_resources_as_required(None);
}

#[test]
#[should_panic(expected = "no high res tiling")]
fn marking_without_high_res_tiling_panics() {
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree_state(), 1.0, false, None);
    layer.remove_tiling(1.0);
    layer.mark_visible_resources_as_required(None);
}

#[test]
fn clean_up_drops_unused_tilings_outside_scale_bands() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&at_page_scale(2.0), 2.0, false, None);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);
    active.calculate_contents_scale(&tree, 1.0, false, None);
    assert_eq!(active.tilings().scales(), vec![2.0, 1.0, 0.25, 0.125]);

    active.clean_up_tilings_on_active_layer(&[2.0], None);
    assert_eq!(active.tilings().scales(), vec![2.0, 1.0, 0.125]);

    active.clean_up_tilings_on_active_layer(&[], None);
    assert_eq!(active.tilings().scales(), vec![1.0, 0.125]);
}

#[test]
fn clean_up_removes_from_pending_twin_too() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&at_page_scale(2.0), 2.0, false, None);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);
    active.calculate_contents_scale(&tree, 1.0, false, None);

    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(1000, 1000, Arc::clone(active.picture())));
    next_pending.sync_from_active_layer(&tree, &active);
    next_pending.calculate_contents_scale(&tree, 1.0, false, None);

    active.clean_up_tilings_on_active_layer(&[], Some(&mut next_pending));
    assert_eq!(next_pending.tilings().scales(), vec![1.0, 0.125]);
}

#[test]
fn append_quads_draws_ready_tiles() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    visible(&mut pending, int_rect(0, 0, 1000, 1000));
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    pending.update_tile_priorities(&tree, None);
    let mut active = activate(&mut pending);
    visible(&mut active, int_rect(0, 0, 500, 500));
    active.calculate_contents_scale(&tree, 1.0, false, None);
    mark_ready(active.tilings().tiling_at_scale(1.0).expect("high res"));

    let mut quads = Vec::new();
    let mut data = AppendQuadsData::default();
    let seen = active.append_quads(&tree, &mut quads, &mut data);

    assert_eq!(quads.len(), 4);
    assert!(quads.iter().all(|quad| matches!(quad, DrawQuad::Tile { .. })));
    let area: i64 = quads.iter().map(|quad| rect_area(quad.rect())).sum();
    assert_eq!(area, 500 * 500);
    assert_eq!(seen.as_slice(), &[1.0]);
    assert_eq!(data, AppendQuadsData::default());
}

#[test]
fn append_quads_fills_missing_tiles_with_background() {
    let tree = TreeState {
        background_color: Color::rgba(10, 20, 30, 255),
        ..tree_state()
    };
    let mut opaque = commit(1000, 1000, recorded_picture(1000, 1000));
    opaque.contents_opaque = true;
    opaque.background_color = Color::TRANSPARENT;
    let mut pending = pending_layer_with(LayerTreeSettings::default(), opaque);
    visible(&mut pending, int_rect(0, 0, 500, 500));
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    pending.update_tile_priorities(&tree, None);
    let mut active = activate(&mut pending);
    visible(&mut active, int_rect(0, 0, 500, 500));
    active.calculate_contents_scale(&tree, 1.0, false, None);

    let mut quads = Vec::new();
    let mut data = AppendQuadsData::default();
    let seen = active.append_quads(&tree, &mut quads, &mut data);

    assert!(seen.is_empty());
    assert!(data.had_incomplete_tile);
    assert_eq!(data.num_missing_tiles, quads.len());
    assert!(quads.iter().all(|quad| matches!(
        quad,
        DrawQuad::SolidColor { color, .. } if *color == tree.background_color
    )));
    let area: i64 = quads.iter().map(|quad| rect_area(quad.rect())).sum();
    assert_eq!(area, 500 * 500);
}

#[test]
fn append_quads_uses_checkerboard_and_debug_borders_when_enabled() {
    let tree = tree_state();
    let settings = LayerTreeSettings {
        draw_checkerboard_for_missing_tiles: true,
        show_debug_borders: true,
        ..LayerTreeSettings::default()
    };
    let mut pending =
        pending_layer_with(settings, commit(1000, 1000, recorded_picture(1000, 1000)));
    visible(&mut pending, int_rect(0, 0, 500, 500));
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    pending.update_tile_priorities(&tree, None);
    let mut active = activate(&mut pending);
    visible(&mut active, int_rect(0, 0, 500, 500));
    active.calculate_contents_scale(&tree, 1.0, false, None);

    let mut quads = Vec::new();
    let mut data = AppendQuadsData::default();
    active.append_quads(&tree, &mut quads, &mut data);

    let borders = quads.iter().filter(|quad| quad.is_debug_border()).count();
    let checkerboards = quads
        .iter()
        .filter(|quad| matches!(quad, DrawQuad::Checkerboard { .. }))
        .count();
    assert!(borders > 0);
    assert_eq!(borders, checkerboards);
    assert_eq!(data.num_missing_tiles, checkerboards);
    assert!(quads.iter().filter(|quad| quad.is_debug_border()).all(|quad| matches!(
        quad,
        DrawQuad::DebugBorder { color, .. } if *color == debug_colors::MISSING_TILE_BORDER
    )));
}

#[test]
fn lower_scale_tile_marks_frame_incomplete() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    visible(&mut pending, int_rect(0, 0, 1000, 1000));
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    pending.update_tile_priorities(&tree, None);
    let mut active = activate(&mut pending);
    visible(&mut active, int_rect(0, 0, 1000, 1000));
    active.calculate_contents_scale(&tree, 1.0, false, None);
    mark_ready(active.tilings().tiling_at_scale(0.125).expect("low res"));

    let mut quads = Vec::new();
    let mut data = AppendQuadsData::default();
    let seen = active.append_quads(&tree, &mut quads, &mut data);

    assert_eq!(seen.as_slice(), &[0.125]);
    assert!(data.had_incomplete_tile);
    assert_eq!(data.num_missing_tiles, 0);
}

#[test]
fn mask_resource_needs_one_ready_tile() {
    let tree = tree_state();
    let mut mask = commit(200, 100, recorded_picture(200, 100));
    mask.is_mask = true;
    let mut layer = pending_layer_with(LayerTreeSettings::default(), mask);
    visible(&mut layer, int_rect(0, 0, 200, 100));
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    layer.update_tile_priorities(&tree, None);
    assert_eq!(layer.contents_resource_id(), None);

    let high_res = layer.tilings().tiling_at_scale(1.0).expect("high res");
    assert_eq!(high_res.num_tiles(), 1);
    let tile = high_res.tile_at(0, 0).expect("mask tile");
    tile.borrow_mut().set_drawing_info(TileDrawingInfo::Resource {
        resource_id: ResourceId(7),
        contents_swizzled: false,
    });
    assert_eq!(layer.contents_resource_id(), Some(ResourceId(7)));
}

#[test]
fn tiled_layer_has_no_mask_resource() {
    let tree = tree_state();
    let mut layer = pending_layer(1000, 1000);
    visible(&mut layer, int_rect(0, 0, 1000, 1000));
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    layer.update_tile_priorities(&tree, None);
    mark_ready(layer.tilings().tiling_at_scale(1.0).expect("high res"));
    assert_eq!(layer.contents_resource_id(), None);
}

#[test]
fn toggling_mask_drops_tiles() {
    let tree = tree_state();
    let mut layer = pending_layer(1000, 1000);
    visible(&mut layer, int_rect(0, 0, 1000, 1000));
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    layer.update_tile_priorities(&tree, None);
    assert!(layer.tilings().num_tiles() > 0);

    layer.set_is_mask(true);
    assert_eq!(layer.tilings().num_tiles(), 0);
    assert_eq!(layer.tilings().num_tilings(), 2);
}

#[test]
fn active_layer_losing_lcd_text_requests_commit() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);
    active.set_draw_properties(LayerDrawProperties {
        can_use_lcd_text: false,
        ..LayerDrawProperties::default()
    });

    assert_eq!(active.update_lcd_text_status(None), LcdTextUpdate::NeedsCommit);
    assert!(!active.is_using_lcd_text());
    assert_eq!(active.update_lcd_text_status(None), LcdTextUpdate::Unchanged);
}

#[test]
fn lcd_text_is_switched_off_on_pending_twin() {
    let tree = tree_state();
    let everything: LayerIntRect = int_rect(0, 0, 1000, 1000);
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);

    let mut next_pending = active.create_twin();
    next_pending.apply_commit(commit(1000, 1000, Arc::clone(active.picture())));
    next_pending.sync_from_active_layer(&tree, &active);
    visible(&mut next_pending, everything);
    next_pending.update_tile_priorities(&tree, Some(&active));
    assert!(next_pending.tilings().num_tiles() > 0);

    active.set_draw_properties(LayerDrawProperties {
        can_use_lcd_text: false,
        ..LayerDrawProperties::default()
    });
    let update = active.update_lcd_text_status(Some(&mut next_pending));

    assert_eq!(update, LcdTextUpdate::SwitchedOffOnPending);
    assert!(!next_pending.is_using_lcd_text());
    assert!(!next_pending.picture().uses_lcd_text());
    assert!(active.picture().uses_lcd_text());
    assert!(next_pending.invalidation().contains_rect(everything));
    assert_eq!(next_pending.tilings().num_tiles(), 0);

    // Tiles come back on the next priority update, without LCD text.
    next_pending.update_tile_priorities(&tree, Some(&active));
    assert!(next_pending.tilings().num_tiles() > 0);
}

#[test]
fn lcd_text_never_switches_back_on() {
    let mut layer = pending_layer(1000, 1000);
    layer.set_draw_properties(LayerDrawProperties {
        can_use_lcd_text: false,
        ..LayerDrawProperties::default()
    });
    assert_eq!(layer.update_lcd_text_status(None), LcdTextUpdate::SwitchedOffOnPending);

    layer.set_draw_properties(LayerDrawProperties::default());
    assert_eq!(layer.update_lcd_text_status(None), LcdTextUpdate::Unchanged);
    assert!(!layer.is_using_lcd_text());
}

#[test]
fn push_properties_transfers_tilings_and_picture() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let picture = Arc::clone(pending.picture());

    let active = activate(&mut pending);

    assert!(Arc::ptr_eq(active.picture(), &picture));
    assert_eq!(active.tilings().scales(), vec![1.0, 0.125]);
    assert_eq!(active.scales().raster_contents_scale, 1.0);
    assert!(pending.tilings().is_empty());
    assert!(pending.picture().is_empty());
}

#[test]
fn losing_output_surface_drops_everything() {
    let tree = tree_state();
    let mut pending = pending_layer(1000, 1000);
    pending.calculate_contents_scale(&tree, 1.0, false, None);
    let mut active = activate(&mut pending);

    active.did_lose_output_surface();
    assert!(active.tilings().is_empty());
    assert_eq!(active.scales().raster_contents_scale, 0.0);

    active.calculate_contents_scale(&tree, 1.0, false, None);
    assert_eq!(high_res_count(&active), 1);
}

#[test]
fn tree_pair_activation_recycles_pending_tree() {
    let tree = tree_state();
    let mut pair = LayerTreePair::new();
    let mut layer = pending_layer(1000, 1000);
    layer.calculate_contents_scale(&tree, 1.0, false, None);
    pair.create_pending_tree().insert(layer);

    assert!(pair.activate());
    assert!(!pair.has_pending_tree());
    let active = pair.active().layer(LayerId(1)).expect("activated layer");
    assert_eq!(active.tree_kind(), TreeKind::Active);
    assert_eq!(active.tilings().scales(), vec![1.0, 0.125]);

    let recycled = pair.create_pending_tree();
    let pending = recycled.layer(LayerId(1)).expect("recycled layer");
    assert!(pending.tilings().is_empty());
}

#[test]
fn twins_are_found_across_trees() {
    let mut pair = LayerTreePair::new();
    pair.create_pending_tree().insert(pending_layer(100, 100));
    assert!(pair.activate());
    pair.create_pending_tree();

    let active = pair.active().layer(LayerId(1)).expect("active layer");
    let pending_twin = pair.pending_twin(active).expect("pending twin");
    assert_eq!(pending_twin.tree_kind(), TreeKind::Pending);
    assert_eq!(
        pair.active_twin(pending_twin).map(PictureLayer::id),
        Some(LayerId(1))
    );

    let (layer, twin) = pair
        .layer_and_twin_mut(TreeKind::Pending, LayerId(1))
        .expect("pending layer");
    assert_eq!(layer.tree_kind(), TreeKind::Pending);
    assert_eq!(twin.map(|twin| twin.tree_kind()), Some(TreeKind::Active));
}

#[test]
#[should_panic(expected = "which is not active")]
fn pending_twin_of_pending_layer_panics() {
    let mut pair = LayerTreePair::new();
    pair.create_pending_tree().insert(pending_layer(100, 100));
    let pending = pair
        .pending()
        .and_then(|tree| tree.layer(LayerId(1)))
        .expect("pending layer");
    pair.pending_twin(pending);
}
