/// Object that can be attached to a pipeline, e.g. a buffer or a texture
pub trait Bindable {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)>;
}

/// Object that can be attached to a pipeline and exists in two copies, one
/// per frame parity.
///
/// The first resource goes into the bind group used during even frames, the
/// second one into the bind group used during odd frames.
pub trait DoubleBufferedBindable {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, [wgpu::BindingResource; 2])>;
}

impl<T> DoubleBufferedBindable for T
where
    T: Bindable,
{
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, [wgpu::BindingResource; 2])> {
        T::bind(self, binding)
            .into_iter()
            .map(|(layout, resource)| (layout, [resource.clone(), resource]))
            .collect()
    }
}

/// Pair of bind groups sharing a single layout; which one is used depends on
/// the frame's parity.
#[derive(Debug)]
pub struct BindGroup {
    bind_group_a: wgpu::BindGroup,
    bind_group_b: wgpu::BindGroup,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl BindGroup {
    pub fn builder<'a>(label: impl ToString) -> BindGroupBuilder<'a> {
        BindGroupBuilder {
            label: label.to_string(),
            entries: Default::default(),
        }
    }

    pub fn get(&self, alternate: bool) -> &wgpu::BindGroup {
        if alternate {
            &self.bind_group_b
        } else {
            &self.bind_group_a
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}

pub struct BindGroupBuilder<'a> {
    label: String,
    entries: Vec<(wgpu::BindGroupLayoutEntry, [wgpu::BindingResource<'a>; 2])>,
}

impl<'a> BindGroupBuilder<'a> {
    /// Binds an item at the next free binding index.
    pub fn add(self, item: &'a dyn DoubleBufferedBindable) -> Self {
        let binding = self.next_binding();

        self.add_at(binding, item)
    }

    /// Binds an item at given binding index; an item can occupy more than
    /// one consecutive index.
    pub fn add_at(mut self, binding: u32, item: &'a dyn DoubleBufferedBindable) -> Self {
        for (layout, resources) in item.bind(binding) {
            assert!(
                self.entries.iter().all(|(other, _)| other.binding != layout.binding),
                "binding {} of `{}` is already taken",
                layout.binding,
                self.label,
            );

            self.entries.push((layout, resources));
        }

        self
    }

    pub fn next_binding(&self) -> u32 {
        self.entries
            .iter()
            .map(|(layout, _)| layout.binding + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn build(mut self, device: &wgpu::Device) -> BindGroup {
        let label = format!("vkpt_{}", self.label);

        self.entries.sort_by_key(|(layout, _)| layout.binding);

        let layouts: Vec<_> = self.entries.iter().map(|(layout, _)| *layout).collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}_layout")),
            entries: &layouts,
        });

        let (entries_a, entries_b): (Vec<_>, Vec<_>) = self
            .entries
            .into_iter()
            .map(|(layout, resources)| {
                let [a, b] = resources.map(|resource| wgpu::BindGroupEntry {
                    binding: layout.binding,
                    resource,
                });

                (a, b)
            })
            .unzip();

        let bind_group_a = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}_a")),
            layout: &bind_group_layout,
            entries: &entries_a,
        });

        let bind_group_b = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}_b")),
            layout: &bind_group_layout,
            entries: &entries_b,
        });

        BindGroup {
            bind_group_a,
            bind_group_b,
            bind_group_layout,
        }
    }
}
