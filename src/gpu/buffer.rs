//! Word buffers on the GPU with blocking readback.

use crate::error::{Error, Result};
use std::sync::Arc;

/// Storage buffer of 32-bit words.
#[derive(Debug)]
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    words: usize,
    device: Arc<wgpu::Device>,
}

impl GpuBuffer {
    /// Allocate room for `words` words. Zero-length requests still allocate
    /// one word, since wgpu rejects empty bindings.
    pub fn new(device: Arc<wgpu::Device>, words: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("coexec-gpu-output"),
            size: (words.max(1) * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            words,
            device,
        }
    }

    pub fn write_words(&self, queue: &wgpu::Queue, data: &[u32]) -> Result<()> {
        if data.len() > self.words {
            return Err(Error::gpu(format!(
                "{} words do not fit a buffer of {}",
                data.len(),
                self.words
            )));
        }
        let bytes: Vec<u8> = data.iter().flat_map(|w| w.to_le_bytes()).collect();
        queue.write_buffer(&self.buffer, 0, &bytes);
        Ok(())
    }

    /// Copy the buffer into a mappable staging buffer and block until the
    /// words are back on the host.
    pub fn read_words(&self, queue: &wgpu::Queue) -> Result<Vec<u32>> {
        if self.words == 0 {
            return Ok(Vec::new());
        }
        let size = (self.words * 4) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("coexec-gpu-staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("coexec-gpu-readback"),
            });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::gpu("readback callback never fired"))?
            .map_err(|e| Error::gpu(format!("readback map failed: {}", e)))?;

        let words = {
            let mapped = slice.get_mapped_range();
            mapped
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        };
        staging.unmap();
        Ok(words)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn words(&self) -> usize {
        self.words
    }
}
