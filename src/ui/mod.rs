use anyhow::Result;
use egui_wgpu::Renderer;
use egui_winit::State;
use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::{event::WindowEvent, window::Window};

/// egui layer that paints the particle field and the tempo readout above it.
pub struct Overlay {
    context: egui::Context,
    state: State,
    renderer: Renderer,
}

impl Overlay {
    pub fn new(window: &Window, device: &Device, format: wgpu::TextureFormat) -> Self {
        let context = egui::Context::default();

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
        );

        let renderer = Renderer::new(device, format, None, 1);

        Self {
            context,
            state: egui_state,
            renderer,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) {
        let _ = self.state.on_window_event(window, event);
    }

    /// Window area in egui points, the space the field's shapes are laid out in.
    pub fn viewport(&self, window: &Window) -> egui::Rect {
        let size = egui_winit::screen_size_in_pixels(window)
            / egui_winit::pixels_per_point(&self.context, window);
        egui::Rect::from_min_size(egui::Pos2::ZERO, size)
    }

    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        size_in_pixels: [u32; 2],
        shapes: Vec<egui::Shape>,
        text: &str,
    ) -> Result<()> {
        let raw_input = self.state.take_egui_input(window);

        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, shapes, text);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(())
    }

    fn ui_content(ctx: &egui::Context, shapes: Vec<egui::Shape>, text: &str) {
        ctx.layer_painter(egui::LayerId::background()).extend(shapes);

        egui::Area::new(egui::Id::new("bpm_readout"))
            .fixed_pos(egui::pos2(10.0, 10.0))
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(
                    egui::RichText::new(text)
                        .size(24.0)
                        .color(egui::Color32::WHITE),
                );
            });
    }
}
